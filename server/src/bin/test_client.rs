//! Headless bot player for exercising a running server.
//!
//! Connects, reports its slot, then answers every snapshot with a paddle
//! position that chases the ball. It is always ready and always votes for a
//! rematch, so two bots play matches back to back.

use clap::Parser;
use log::{info, warn};
use pong_shared::codec;
use pong_shared::{ClientInput, Handshake, MatchState, MatchStatus, NetError};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Furthest the paddle moves per snapshot
    #[arg(long, default_value = "7.0")]
    paddle_speed: f32,

    /// Disconnect after this many finished matches (0 plays forever)
    #[arg(short, long, default_value = "0")]
    matches: u32,
}

/// Moves the paddle centre toward the ball, at most `speed` per call.
fn track_ball(state: &MatchState, current_y: f32, speed: f32) -> f32 {
    let target = state.ball.y - state.paddle_height / 2.0;
    let step = (target - current_y).clamp(-speed, speed);
    (current_y + step).clamp(0.0, state.max_paddle_y())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    let handshake: Handshake = match codec::read_message(&mut reader).await {
        Ok(handshake) => handshake,
        Err(NetError::Closed) => {
            warn!("Server closed the connection, it is probably full");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let slot = handshake.slot as usize;
    info!("Connected to {} as player {}", args.server, slot);

    let mut paddle_y = None;
    let mut last_status = None;
    let mut finished = 0;

    loop {
        let state: MatchState = match codec::read_message(&mut reader).await {
            Ok(state) => state,
            Err(NetError::Closed) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if last_status != Some(state.status) {
            let (left, right) = state.scores();
            info!("{:?} (score {} - {})", state.status, left, right);

            if state.status == MatchStatus::GameOver {
                match state.winner {
                    Some(winner) if winner as usize == slot => info!("We won"),
                    Some(winner) => info!("Player {} won", winner),
                    None => {}
                }
                finished += 1;
                if args.matches > 0 && finished >= args.matches {
                    info!("Played {} matches, leaving", finished);
                    break;
                }
            }
            last_status = Some(state.status);
        }

        let current = paddle_y.unwrap_or(state.paddles[slot].y);
        let next = track_ball(&state, current, args.paddle_speed);
        paddle_y = Some(next);

        let input = ClientInput {
            paddle_y: next,
            ready: true,
            play_again: true,
        };
        codec::write_message(&mut writer, &input).await?;
    }

    Ok(())
}
