use bevy::{
    prelude::*,
    window::{CursorEntered, CursorIcon, PrimaryWindow, SystemCursorIcon, WindowFocused},
};

use crate::physics::PhysicsState;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CursorKind {
    Default,
    Grabbing,
}

#[derive(Resource, PartialEq)]
struct CurrentCursor(CursorKind);

pub(super) fn plugin(app: &mut App) {
    app.insert_resource(CurrentCursor(CursorKind::Default));

    app.add_systems(
        Update,
        (
            follow_drag_state,
            apply_cursor.run_if(resource_changed::<CurrentCursor>),
        )
            .chain(),
    );

    // Re-apply on focus/enter to avoid OS resets
    app.add_systems(Update, (reapply_on_focus, reapply_on_enter));
}

fn icon(kind: CursorKind) -> CursorIcon {
    match kind {
        CursorKind::Default => CursorIcon::System(SystemCursorIcon::Default),
        CursorKind::Grabbing => CursorIcon::System(SystemCursorIcon::Grabbing),
    }
}

fn follow_drag_state(physics: Res<PhysicsState>, mut current: ResMut<CurrentCursor>) {
    let desired = if physics.drag.is_dragging() {
        CursorKind::Grabbing
    } else {
        CursorKind::Default
    };
    // Only touch the resource on change so `apply_cursor` stays idle.
    current.set_if_neq(CurrentCursor(desired));
}

fn apply_cursor(
    mut commands: Commands,
    window: Single<Entity, With<PrimaryWindow>>,
    current: Res<CurrentCursor>,
) {
    commands.entity(*window).insert(icon(current.0));
}

fn reapply_on_focus(
    mut commands: Commands,
    mut messages: MessageReader<WindowFocused>,
    window: Single<Entity, With<PrimaryWindow>>,
    current: Res<CurrentCursor>,
) {
    for message in messages.read() {
        if message.focused {
            commands.entity(*window).insert(icon(current.0));
        }
    }
}

fn reapply_on_enter(
    mut commands: Commands,
    mut messages: MessageReader<CursorEntered>,
    window: Single<Entity, With<PrimaryWindow>>,
    current: Res<CurrentCursor>,
) {
    for _ in messages.read() {
        commands.entity(*window).insert(icon(current.0));
    }
}
