use serde::{Deserialize, Serialize};

pub mod codec;
pub mod error;

pub use error::NetError;

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const PADDLE_WIDTH: f32 = 15.0;
pub const PADDLE_HEIGHT: f32 = 100.0;
pub const PADDLE_START_Y: f32 = (WORLD_HEIGHT - PADDLE_HEIGHT) / 2.0;
pub const BALL_RADIUS: f32 = 10.0;
pub const BALL_SPEED: f32 = 4.0;
pub const MAX_BALL_SPEED: f32 = 12.0;
pub const MAX_SERVE_DY: f32 = 3.0;
pub const SPEED_INCREMENT: f32 = 0.05;
pub const SPIN: f32 = 3.0;
pub const WIN_SCORE: u32 = 5;
pub const PLAYER_COUNT: usize = 2;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    AwaitingConnection,
    AwaitingReady,
    Playing,
    GameOver,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub radius: f32,
}

impl Ball {
    /// Ball at the centre of the playfield with the opening velocity.
    pub fn new() -> Self {
        Self {
            x: WORLD_WIDTH / 2.0,
            y: WORLD_HEIGHT / 2.0,
            dx: BALL_SPEED,
            dy: BALL_SPEED,
            radius: BALL_RADIUS,
        }
    }

    pub fn reset(&mut self, dx: f32, dy: f32) {
        self.x = WORLD_WIDTH / 2.0;
        self.y = WORLD_HEIGHT / 2.0;
        self.dx = dx;
        self.dy = dy;
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Paddle {
    pub y: f32,
    pub score: u32,
    pub ready: bool,
    pub play_again: bool,
}

impl Paddle {
    pub fn new() -> Self {
        Self {
            y: PADDLE_START_Y,
            score: 0,
            ready: false,
            play_again: false,
        }
    }
}

impl Default for Paddle {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative match record. It is also the snapshot payload the
/// server broadcasts, so every field here is part of the wire contract.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MatchState {
    pub ball: Ball,
    /// Indexed by player slot: 0 is the left paddle, 1 the right.
    pub paddles: [Paddle; PLAYER_COUNT],
    pub width: f32,
    pub height: f32,
    pub paddle_width: f32,
    pub paddle_height: f32,
    pub status: MatchStatus,
    pub win_score: u32,
    pub speed_multiplier: f32,
    pub winner: Option<u8>,
    pub tick: u32,
}

impl MatchState {
    pub fn new() -> Self {
        Self {
            ball: Ball::new(),
            paddles: [Paddle::new(), Paddle::new()],
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            paddle_width: PADDLE_WIDTH,
            paddle_height: PADDLE_HEIGHT,
            status: MatchStatus::AwaitingConnection,
            win_score: WIN_SCORE,
            speed_multiplier: 1.0,
            winner: None,
            tick: 0,
        }
    }

    pub fn max_paddle_y(&self) -> f32 {
        self.height - self.paddle_height
    }

    pub fn all_ready(&self) -> bool {
        self.paddles.iter().all(|p| p.ready)
    }

    pub fn all_play_again(&self) -> bool {
        self.paddles.iter().all(|p| p.play_again)
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.paddles[0].score, self.paddles[1].score)
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

/// First frame on every accepted connection.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub slot: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ClientInput {
    pub paddle_y: f32,
    pub ready: bool,
    pub play_again: bool,
}
