//! Two-peer placement tests: ghosts, snapping, removal and ownership.

use std::cell::RefCell;
use std::rc::Rc;

use tether_protocol::{NetworkId, Quat, SnapLink, SyncMessage, Vec3};
use tether_scene::NetworkScene;
use tether_sync::{
    PlaceableDescriptor, Placeable, PlacedIndex, PlacementState, SnapEdge, SnapRef, SyncError,
};
use tether_transport::ChannelConnection;

// =========================================================================
// Helpers
// =========================================================================

struct Peer {
    scene: NetworkScene,
    index: PlacedIndex,
}

impl Peer {
    fn new() -> Self {
        Self {
            scene: NetworkScene::default(),
            index: PlacedIndex::new(),
        }
    }

    fn spawn(&self, name: &str, local: bool) -> Rc<RefCell<Placeable>> {
        self.spawn_with(name, local, rail())
    }

    fn spawn_with(
        &self,
        name: &str,
        local: bool,
        descriptor: PlaceableDescriptor,
    ) -> Rc<RefCell<Placeable>> {
        let node = self.scene.object_by_name(name).unwrap();
        let placeable = Placeable::spawn(&self.scene, node, descriptor, &self.index).unwrap();
        placeable.borrow_mut().on_spawned(local);
        placeable
    }
}

fn linked_peers() -> (Peer, Peer) {
    let a = Peer::new();
    let b = Peer::new();
    let (left, right) = ChannelConnection::pair();
    a.scene.add_connection(left);
    b.scene.add_connection(right);
    (a, b)
}

fn rail() -> PlaceableDescriptor {
    PlaceableDescriptor {
        name: "Rail".into(),
        material_cost: 3,
        can_be_placed_freely: true,
        snap_count: 2,
    }
}

fn link(snap_index: u32, target: NetworkId, target_snap_index: u32) -> SnapLink {
    SnapLink {
        snap_index,
        target,
        target_snap_index,
    }
}

fn settle(peers: &[&Peer]) {
    for peer in peers {
        peer.scene.tick();
    }
}

// =========================================================================
// Placement replication
// =========================================================================

#[test]
fn test_free_placement_replicates() {
    let (a, b) = linked_peers();
    let q = a.spawn("Q", true);
    let q_replica = b.spawn("Q", false);
    settle(&[&a, &b]);

    q.borrow_mut().place_freely().unwrap();
    b.scene.tick();

    let replica = q_replica.borrow();
    assert_eq!(replica.state(), PlacementState::Placed);
    assert!(replica.colliders_enabled());
    assert!(!replica.is_original_owner());
    assert_eq!(replica.snap_collider_enabled(0), Some(true));
    assert!(b.index.contains(replica.id()));
}

#[test]
fn test_snapped_placement_links_both_ends_on_both_peers() {
    let (a, b) = linked_peers();
    let q = a.spawn("Q", true);
    let p = a.spawn("P", true);
    let q_replica = b.spawn("Q", false);
    let p_replica = b.spawn("P", false);
    settle(&[&a, &b]);

    let q_id = q.borrow().id();
    let p_id = p.borrow().id();
    q.borrow_mut().place_freely().unwrap();
    p.borrow_mut().place(Some(link(0, q_id, 1))).unwrap();
    b.scene.tick();

    for (p, q) in [(&p, &q), (&p_replica, &q_replica)] {
        let (p, q) = (p.borrow(), q.borrow());
        assert!(p.is_attached(0, SnapRef { object: q_id, snap: 1 }));
        assert!(q.is_attached(1, SnapRef { object: p_id, snap: 0 }));
        assert_eq!(p.snap_collider_enabled(0), Some(false));
        assert_eq!(p.snap_collider_enabled(1), Some(true));
        assert_eq!(q.snap_collider_enabled(1), Some(false));
    }
}

#[test]
fn test_replica_with_missing_target_places_unattached() {
    let (a, b) = linked_peers();
    let q = a.spawn("Q", true);
    let p = a.spawn("P", true);
    let p_replica = b.spawn("P", false);
    settle(&[&a, &b]);

    // B never learned about Q.
    let q_id = q.borrow().id();
    q.borrow_mut().place_freely().unwrap();
    p.borrow_mut().place(Some(link(0, q_id, 1))).unwrap();
    b.scene.tick();

    let replica = p_replica.borrow();
    assert_eq!(replica.state(), PlacementState::Placed);
    assert!(replica.attached_to().is_empty());
    assert_eq!(replica.snap_collider_enabled(0), Some(true));
}

#[test]
fn test_position_updates_replicate() {
    let (a, b) = linked_peers();
    let p = a.spawn("P", true);
    let p_replica = b.spawn("P", false);
    settle(&[&a, &b]);

    let pose = (Vec3::new(1.0, 0.5, -2.0), Quat::new(0.0, 0.7071, 0.0, 0.7071));
    p.borrow_mut().move_to(pose.0, pose.1).unwrap();
    b.scene.tick();

    assert_eq!(p_replica.borrow().pose(), pose);
}

// =========================================================================
// Removal
// =========================================================================

#[test]
fn test_remove_detaches_both_sides_and_keeps_neighbour() {
    let (a, b) = linked_peers();
    let q = a.spawn("Q", true);
    let p = a.spawn("P", true);
    let q_replica = b.spawn("Q", false);
    let p_replica = b.spawn("P", false);
    settle(&[&a, &b]);

    let q_id = q.borrow().id();
    let p_id = p.borrow().id();
    q.borrow_mut().place_freely().unwrap();
    p.borrow_mut().place(Some(link(0, q_id, 1))).unwrap();
    b.scene.tick();

    p.borrow_mut().remove().unwrap();
    b.scene.tick();

    for (p, q, index) in [(&p, &q, &a.index), (&p_replica, &q_replica, &b.index)] {
        let (p, q) = (p.borrow(), q.borrow());
        assert_eq!(p.state(), PlacementState::Removed);
        assert!(p.attached_to().is_empty());
        assert!(p.node().is_none());
        assert_eq!(q.state(), PlacementState::Placed);
        assert!(q.attached_to().is_empty());
        assert_eq!(q.snap_collider_enabled(1), Some(true));
        assert!(!index.contains(p_id));
        assert!(index.contains(q_id));
    }
}

#[test]
fn test_removed_object_leaves_the_scene() {
    let (a, _b) = linked_peers();
    let p = a.spawn("P", true);
    a.scene.tick();
    assert_eq!(a.scene.object_count(), 1);

    p.borrow_mut().place_freely().unwrap();
    p.borrow_mut().remove().unwrap();
    a.scene.tick();

    assert_eq!(a.scene.object_count(), 0);
}

#[test]
fn test_only_original_owner_may_remove() {
    let (a, b) = linked_peers();
    let p = a.spawn("P", true);
    let p_replica = b.spawn("P", false);
    settle(&[&a, &b]);

    p.borrow_mut().place_freely().unwrap();
    b.scene.tick();

    p_replica.borrow_mut().take_control().unwrap();
    a.scene.tick();
    assert!(!p.borrow().is_owner());
    assert!(p.borrow().is_original_owner());

    let err = p_replica.borrow_mut().remove().unwrap_err();
    assert!(matches!(err, SyncError::NotOriginalOwner { .. }));

    p.borrow_mut().remove().unwrap();
    b.scene.tick();
    assert_eq!(p_replica.borrow().state(), PlacementState::Removed);
}

#[test]
fn test_remove_of_ghost_is_invalid_state() {
    let scene = NetworkScene::default();
    let index = PlacedIndex::new();
    let node = scene.object_by_name("Q").unwrap();
    let q = Placeable::spawn(&scene, node, rail(), &index).unwrap();
    q.borrow_mut().on_spawned(true);

    // Not yet placed, so there is no original owner either.
    assert!(matches!(
        q.borrow_mut().remove().unwrap_err(),
        SyncError::NotOriginalOwner { .. }
    ));
}

#[test]
fn test_remove_twice_is_invalid_state() {
    let a = Peer::new();
    let p = a.spawn("P", true);
    p.borrow_mut().place_freely().unwrap();
    p.borrow_mut().remove().unwrap();

    let err = p.borrow_mut().remove().unwrap_err();
    assert!(matches!(
        err,
        SyncError::InvalidState {
            state: PlacementState::Removed,
            ..
        }
    ));
}

// =========================================================================
// Ghost discard
// =========================================================================

#[test]
fn test_deselect_destroys_ghost_everywhere() {
    let (a, b) = linked_peers();
    let p = a.spawn("P", true);
    let p_replica = b.spawn("P", false);
    settle(&[&a, &b]);

    p.borrow_mut().deselect().unwrap();
    b.scene.tick();

    assert_eq!(p.borrow().state(), PlacementState::Removed);
    assert_eq!(p_replica.borrow().state(), PlacementState::Removed);
    assert!(p_replica.borrow().node().is_none());
}

#[test]
fn test_deselect_after_place_is_rejected() {
    let a = Peer::new();
    let p = a.spawn("P", true);
    p.borrow_mut().place_freely().unwrap();
    let err = p.borrow_mut().deselect().unwrap_err();
    assert!(matches!(
        err,
        SyncError::InvalidState {
            state: PlacementState::Placed,
            ..
        }
    ));
}

#[test]
fn test_messages_after_removal_are_ignored() {
    let (a, b) = linked_peers();
    let p = a.spawn("P", true);
    let p_replica = b.spawn("P", false);
    settle(&[&a, &b]);

    p_replica.borrow_mut().handle(SyncMessage::OnDestroy).unwrap();
    p.borrow_mut().move_to(Vec3::new(3.0, 0.0, 0.0), Quat::IDENTITY).unwrap();
    b.scene.tick();

    let replica = p_replica.borrow();
    assert_eq!(replica.state(), PlacementState::Removed);
    assert_eq!(replica.pose().0, Vec3::ZERO);
}

// =========================================================================
// Ownership and authority
// =========================================================================

#[test]
fn test_new_owner_revokes_previous_owner() {
    let (a, b) = linked_peers();
    let p = a.spawn("P", true);
    let p_replica = b.spawn("P", false);
    settle(&[&a, &b]);

    p_replica.borrow_mut().take_control().unwrap();
    a.scene.tick();

    assert!(!p.borrow().is_owner());
    assert!(p_replica.borrow().is_owner());
    assert!(matches!(
        p.borrow_mut().move_to(Vec3::ZERO, Quat::IDENTITY),
        Err(SyncError::NotOwner { operation: "move", .. })
    ));
}

#[test]
fn test_owner_rejects_authoritative_messages() {
    let a = Peer::new();
    let p = a.spawn("P", true);

    for message in [
        SyncMessage::PositionUpdate {
            position: Vec3::new(9.0, 9.0, 9.0),
            rotation: Quat::IDENTITY,
        },
        SyncMessage::OnPlace { link: None },
        SyncMessage::OnDestroy,
    ] {
        let tag = message.tag();
        let err = p.borrow_mut().handle(message).unwrap_err();
        assert!(
            matches!(err, SyncError::ProtocolViolation { tag: t, .. } if t == tag),
            "{tag} should be refused"
        );
    }
    let p = p.borrow();
    assert_eq!(p.state(), PlacementState::Ghost);
    assert_eq!(p.pose().0, Vec3::ZERO);
}

#[test]
fn test_owner_violation_during_tick_is_contained() {
    let (a, b) = linked_peers();
    let p = a.spawn("P", true);
    let q = a.spawn("Q", false);
    let p_replica = b.spawn("P", false);
    let q_owner = b.spawn("Q", true);
    settle(&[&a, &b]);

    // B wrongly believes it may place P; A still owns it.
    p_replica
        .borrow()
        .context()
        .send(&SyncMessage::OnPlace { link: None })
        .unwrap();
    q_owner.borrow_mut().place_freely().unwrap();
    a.scene.tick();

    assert_eq!(p.borrow().state(), PlacementState::Ghost);
    assert_eq!(q.borrow().state(), PlacementState::Placed);
}

#[test]
fn test_replica_operations_require_ownership() {
    let a = Peer::new();
    let p = a.spawn("P", false);
    assert!(matches!(
        p.borrow_mut().place_freely(),
        Err(SyncError::NotOwner { operation: "place", .. })
    ));
    assert!(matches!(
        p.borrow_mut().deselect(),
        Err(SyncError::NotOwner { operation: "deselect", .. })
    ));
}

// =========================================================================
// Placement validation
// =========================================================================

#[test]
fn test_place_rejects_bad_links_without_sending() {
    let (a, b) = linked_peers();
    let q = a.spawn("Q", true);
    let p = a.spawn("P", true);
    let p_replica = b.spawn("P", false);
    settle(&[&a, &b]);
    let q_id = q.borrow().id();
    let p_id = p.borrow().id();

    assert!(matches!(
        p.borrow_mut().place(Some(link(0, q_id, 1))),
        Err(SyncError::TargetNotPlaced(id)) if id == q_id
    ));
    q.borrow_mut().place_freely().unwrap();
    assert!(matches!(
        p.borrow_mut().place(Some(link(5, q_id, 1))),
        Err(SyncError::InvalidSnap { index: 5, .. })
    ));
    assert!(matches!(
        p.borrow_mut().place(Some(link(0, q_id, 7))),
        Err(SyncError::InvalidSnap { index: 7, .. })
    ));
    assert!(matches!(
        p.borrow_mut().place(Some(link(0, p_id, 1))),
        Err(SyncError::InvalidSnap { .. })
    ));
    b.scene.tick();

    assert_eq!(p.borrow().state(), PlacementState::Ghost);
    assert_eq!(p_replica.borrow().state(), PlacementState::Ghost);
}

#[test]
fn test_free_placement_can_be_forbidden() {
    let a = Peer::new();
    let descriptor = PlaceableDescriptor {
        can_be_placed_freely: false,
        ..rail()
    };
    let q = a.spawn("Q", true);
    let p = a.spawn_with("P", true, descriptor);
    q.borrow_mut().place_freely().unwrap();
    let q_id = q.borrow().id();

    assert!(matches!(
        p.borrow_mut().place_freely(),
        Err(SyncError::FreePlacementNotAllowed { .. })
    ));
    p.borrow_mut().place(Some(link(1, q_id, 0))).unwrap();
    assert_eq!(
        p.borrow().attached_to(),
        &[SnapEdge {
            mine: 1,
            other: SnapRef { object: q_id, snap: 0 }
        }]
    );
}

#[test]
fn test_chain_removal_of_middle_piece() {
    let a = Peer::new();
    let left = a.spawn("Left", true);
    let middle = a.spawn("Middle", true);
    let right = a.spawn("Right", true);
    let left_id = left.borrow().id();
    let middle_id = middle.borrow().id();

    left.borrow_mut().place_freely().unwrap();
    middle.borrow_mut().place(Some(link(0, left_id, 1))).unwrap();
    right.borrow_mut().place(Some(link(0, middle_id, 1))).unwrap();
    assert_eq!(middle.borrow().attached_to().len(), 2);

    middle.borrow_mut().remove().unwrap();

    assert!(left.borrow().attached_to().is_empty());
    assert!(right.borrow().attached_to().is_empty());
    assert_eq!(left.borrow().state(), PlacementState::Placed);
    assert_eq!(right.borrow().state(), PlacementState::Placed);
    assert_eq!(a.index.len(), 2);
}
