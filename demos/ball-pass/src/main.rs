//! Two peers in one process pass a ball back and forth and build a
//! small structure.
//!
//! ```text
//! cargo run -p ball-pass [peer.json]
//! RUST_LOG=debug cargo run -p ball-pass
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use tether::prelude::*;

const FRAMES: u64 = 180;

// ---------------------------------------------------------------------------
// Scene setup
// ---------------------------------------------------------------------------

struct Side {
    /// The host owns the ball's node; the rigidbody only refers to it.
    _ball_node: Rc<Node>,
    ball: Rc<RefCell<NetworkedRigidbody>>,
    floor: Rc<RefCell<Placeable>>,
    rail: Rc<RefCell<Placeable>>,
    hand: Rc<Hand>,
}

fn piece(name: &str, snap_count: u32) -> PlaceableDescriptor {
    PlaceableDescriptor {
        name: name.into(),
        material_cost: snap_count * 2,
        can_be_placed_freely: true,
        snap_count,
    }
}

/// Spawns the shared objects on `peer`. Alice spawned them, so she starts
/// as owner of everything.
fn populate(peer: &mut Peer, local: bool, hand_at: Vec3) -> Result<Side, TetherError> {
    let ball_node = peer.object("Ball")?;
    let ball = peer.spawn_rigidbody(&ball_node, SimpleBody::at(Vec3::new(0.0, 1.0, 0.0)), local)?;
    let floor = peer.spawn_placeable(peer.object("Floor")?, piece("Floor", 4), local)?;
    let rail = peer.spawn_placeable(peer.object("Rail")?, piece("Rail", 2), local)?;
    Ok(Side {
        _ball_node: ball_node,
        ball,
        floor,
        rail,
        hand: Rc::new(Hand::at(hand_at)),
    })
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// Alice builds, carries the ball in an arc, drops it, and later tears the
/// rail down again.
fn alice_frame(side: &Side, frame: &Frame) -> Result<(), TetherError> {
    let grasper: Rc<dyn Grasper> = side.hand.clone();
    match frame.index {
        5 => side.floor.borrow_mut().place_freely()?,
        10 => {
            let floor = side.floor.borrow().id();
            side.rail.borrow_mut().place(Some(SnapLink {
                snap_index: 0,
                target: floor,
                target_snap_index: 2,
            }))?;
        }
        20 => side.ball.borrow_mut().grasp(grasper)?,
        21..=59 => {
            let t = (frame.index - 20) as f32 / 40.0;
            side.hand.move_to(Vec3::new(2.0 * t, 1.0 + t * (1.0 - t), 0.0));
        }
        60 => {
            side.ball.borrow_mut().release(&grasper)?;
        }
        150 => side.rail.borrow_mut().remove()?,
        _ => {}
    }
    Ok(())
}

/// Bob waits for the ball to land, takes it, and throws it back.
fn bob_frame(side: &Side, frame: &Frame) -> Result<(), TetherError> {
    let grasper: Rc<dyn Grasper> = side.hand.clone();
    match frame.index {
        90 => {
            if !side.ball.borrow_mut().take_control()? {
                tracing::warn!("ball still held by alice");
            }
        }
        100 => side.ball.borrow_mut().grasp(grasper)?,
        101..=129 => {
            let t = (frame.index - 100) as f32 / 30.0;
            side.hand.move_to(Vec3::new(2.0 - 1.5 * t, 1.5, 0.0));
        }
        130 => {
            side.ball.borrow_mut().release(&grasper)?;
        }
        _ => {}
    }
    Ok(())
}

fn report(who: &str, side: &Side) {
    let ball = side.ball.borrow();
    let position = ball.body().position();
    tracing::info!(
        peer = who,
        owner = ball.is_owner(),
        x = position.x,
        y = position.y,
        floor = %side.floor.borrow().state(),
        rail = %side.rail.borrow().state(),
        "final state"
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), TetherError> {
    tether::logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => PeerConfig::from_json_file(path)?,
        None => PeerConfig::default(),
    };

    let mut alice = Peer::new(config.clone());
    let mut bob = Peer::new(config);
    let (a, b) = ChannelConnection::pair();
    alice.connect(a);
    bob.connect(b);

    let alice_side = populate(&mut alice, true, Vec3::new(0.0, 1.0, 0.0))?;
    let bob_side = populate(&mut bob, false, Vec3::new(2.0, 1.5, 0.0))?;
    tracing::info!(frames = FRAMES, "starting ball pass");

    let (alice_stats, bob_stats) = tokio::join!(
        alice.run_with(FRAMES, |_, frame| {
            if let Err(error) = alice_frame(&alice_side, frame) {
                tracing::error!(peer = "alice", frame = frame.index, %error, "script step failed");
            }
        }),
        bob.run_with(FRAMES, |_, frame| {
            if let Err(error) = bob_frame(&bob_side, frame) {
                tracing::error!(peer = "bob", frame = frame.index, %error, "script step failed");
            }
        }),
    );

    report("alice", &alice_side);
    report("bob", &bob_side);
    tracing::info!(
        alice_late = alice_stats.late_frames,
        bob_late = bob_stats.late_frames,
        placed = alice.placed().len(),
        "done"
    );

    alice.dispose();
    bob.dispose();
    Ok(())
}
