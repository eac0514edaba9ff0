//! Integration tests for the shareable view token feeding presence.

use tilemap_collab::Viewport;
use tilemap_core::view::{decode, encode};
use tilemap_core::{MemoryLocation, Origin, ViewDefaults, ViewState, ViewStateSync, ViewUpdate};

#[test]
fn test_shared_link_opens_same_view() {
    let mut sender = ViewStateSync::mount(MemoryLocation::new(), ViewDefaults::default());
    sender.set_world("lobby");
    sender.set_coords(-12, 40);
    sender.zoom_out();
    let link = sender.token();

    let receiver = ViewStateSync::mount(MemoryLocation::with_token(link), ViewDefaults::default());
    assert_eq!(receiver.view(), &ViewState::new("lobby", -12, 40, 16.0));
    assert!(receiver.location().history().len() == 1);
}

#[test]
fn test_back_button_restores_previous_view() {
    let mut sync = ViewStateSync::mount(MemoryLocation::new(), ViewDefaults::default());
    sync.set_coords(1, 1);
    sync.set_coords(2, 2);

    assert!(sync.location_mut().back());
    assert!(sync.on_location_change());
    assert_eq!((sync.view().x, sync.view().y), (1, 1));
}

#[test]
fn test_external_update_never_writes_back() {
    let mut sync = ViewStateSync::mount(MemoryLocation::new(), ViewDefaults::default());
    let before = sync.location().history().len();
    sync.apply(ViewUpdate {
        state: ViewState::new("elsewhere", 9, 9, 8.0),
        origin: Origin::External,
    });
    assert_eq!(sync.location().history().len(), before);
    assert_eq!(sync.view().world_id, "elsewhere");
}

#[test]
fn test_viewport_published_for_current_view() {
    let view = decode(&encode(&ViewState::new("w1", 10, -5, 64.0))).unwrap();
    let viewport = Viewport::from_view(&view, 1280.0, 640.0);
    assert_eq!(viewport, Viewport::new(10.0, -5.0, 20.0, 10.0));
}
