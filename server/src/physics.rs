//! Ball physics for one simulation tick.
//!
//! These functions only move the ball and report what happened. Scoring
//! and status changes are applied by [`crate::game::Game`].

use pong_shared::{Ball, MatchState, MAX_BALL_SPEED, PLAYER_COUNT, SPEED_INCREMENT, SPIN};

/// Moves the ball by its velocity scaled by the speed multiplier.
pub fn integrate(state: &mut MatchState) {
    let multiplier = state.speed_multiplier;
    state.ball.x += state.ball.dx * multiplier;
    state.ball.y += state.ball.dy * multiplier;
}

/// Reflects the ball off the top and bottom edges.
///
/// Afterwards `y` lies in `[radius, height - radius]` and the vertical
/// velocity points back into the field. Returns true on a bounce.
pub fn bounce_walls(ball: &mut Ball, height: f32) -> bool {
    if ball.y - ball.radius <= 0.0 {
        ball.y = ball.radius;
        ball.dy = ball.dy.abs();
        true
    } else if ball.y + ball.radius >= height {
        ball.y = height - ball.radius;
        ball.dy = -ball.dy.abs();
        true
    } else {
        false
    }
}

/// X coordinate of the paddle face the ball bounces off.
pub fn paddle_face(state: &MatchState, slot: usize) -> f32 {
    if slot == 0 {
        state.paddle_width
    } else {
        state.width - state.paddle_width
    }
}

/// Checks both paddles and returns the slot whose paddle was hit.
pub fn collide_paddles(state: &mut MatchState) -> Option<u8> {
    (0..PLAYER_COUNT)
        .find(|&slot| collide_paddle(state, slot))
        .map(|slot| slot as u8)
}

fn collide_paddle(state: &mut MatchState, slot: usize) -> bool {
    let face = paddle_face(state, slot);
    let top = state.paddles[slot].y;
    let paddle_height = state.paddle_height;
    let width = state.width;
    let ball = &mut state.ball;

    // A ball already moving away from the paddle cannot hit it again.
    let (approaching, crossed) = if slot == 0 {
        (ball.dx < 0.0, ball.x - ball.radius <= face && ball.x > 0.0)
    } else {
        (ball.dx > 0.0, ball.x + ball.radius >= face && ball.x < width)
    };
    let within_span = ball.y >= top && ball.y <= top + paddle_height;

    if !(approaching && crossed && within_span) {
        return false;
    }

    // 0.0 at the top edge of the paddle, 1.0 at the bottom edge
    let offset = ((ball.y - top) / paddle_height).clamp(0.0, 1.0);

    if slot == 0 {
        ball.dx = ball.dx.abs();
        ball.x = face + ball.radius;
    } else {
        ball.dx = -ball.dx.abs();
        ball.x = face - ball.radius;
    }
    ball.dy += (offset - 0.5) * 2.0 * SPIN;
    state.speed_multiplier += SPEED_INCREMENT;

    true
}

/// Clamps each velocity component to the speed cap.
pub fn cap_speed(ball: &mut Ball) {
    ball.dx = ball.dx.clamp(-MAX_BALL_SPEED, MAX_BALL_SPEED);
    ball.dy = ball.dy.clamp(-MAX_BALL_SPEED, MAX_BALL_SPEED);
}

/// Returns the slot that scores if the ball has left the field.
pub fn check_goal(state: &MatchState) -> Option<u8> {
    if state.ball.x <= 0.0 {
        Some(1)
    } else if state.ball.x >= state.width {
        Some(0)
    } else {
        None
    }
}
