//! Turns button presses and horizontal drags into navigation intents.

use crate::gallery::GalleryState;

/// Horizontal travel a drag must exceed before it turns the page.
pub const SWIPE_THRESHOLD: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavIntent {
    Prev,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Previous,
    Next,
}

impl From<Control> for NavIntent {
    fn from(control: Control) -> Self {
        match control {
            Control::Previous => NavIntent::Prev,
            Control::Next => NavIntent::Next,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    Start(f32),
    Move(f32),
    End,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum GestureState {
    #[default]
    Idle,
    Tracking {
        start_x: f32,
    },
}

/// Pure gesture transition. A gesture fires at most once; after that it is
/// ignored until the next `Start`.
pub fn step(
    state: GestureState,
    event: GestureEvent,
    threshold: f32,
) -> (GestureState, Option<NavIntent>) {
    match (state, event) {
        (_, GestureEvent::Start(x)) => (GestureState::Tracking { start_x: x }, None),
        (_, GestureEvent::End) => (GestureState::Idle, None),
        (GestureState::Idle, GestureEvent::Move(_)) => (GestureState::Idle, None),
        (GestureState::Tracking { start_x }, GestureEvent::Move(x)) => {
            let delta = x - start_x;
            // NaN or infinite travel never turns the page.
            if !delta.is_finite() || delta.abs() <= threshold {
                return (state, None);
            }
            let intent = if delta > 0.0 {
                NavIntent::Prev
            } else {
                NavIntent::Next
            };
            (GestureState::Idle, Some(intent))
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputAdapter {
    gesture: GestureState,
    threshold: f32,
}

impl Default for InputAdapter {
    fn default() -> Self {
        Self::new(SWIPE_THRESHOLD)
    }
}

impl InputAdapter {
    pub fn new(threshold: f32) -> Self {
        Self {
            gesture: GestureState::Idle,
            threshold,
        }
    }

    pub fn gesture_state(&self) -> GestureState {
        self.gesture
    }

    /// Returns whether the gallery moved.
    pub fn control(&mut self, control: Control, gallery: &mut GalleryState) -> bool {
        gallery.apply(control.into())
    }

    /// Returns the intent the event produced (if any) and whether the gallery moved.
    pub fn gesture(
        &mut self,
        event: GestureEvent,
        gallery: &mut GalleryState,
    ) -> (Option<NavIntent>, bool) {
        let (next, intent) = step(self.gesture, event, self.threshold);
        self.gesture = next;
        let moved = intent.is_some_and(|intent| gallery.apply(intent));
        (intent, moved)
    }
}

#[cfg(test)]
#[path = "tests/input_tests.rs"]
mod tests;
