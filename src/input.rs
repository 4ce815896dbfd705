//! Translation of platform touch events into gesture input.
//!
//! Platforms report touches per contact (finger) while the
//! [`GestureDisambiguator`](crate::gesture::GestureDisambiguator) reasons
//! about "the gesture" plus the number of fingers currently down. The
//! [`TouchTracker`] keeps the set of live contacts for winit hosts; the web
//! binding reads the contact count straight off the DOM event.

use std::collections::HashMap;

use winit::{
    dpi::PhysicalPosition,
    event::{Touch, TouchPhase},
};

/// A touch event as the viewer consumes it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TouchInput {
    Start { contacts: usize, x: f32, y: f32 },
    Move { contacts: usize, x: f32, y: f32 },
    End,
    Cancel,
}

#[derive(Debug, Default)]
pub struct TouchTracker {
    contacts: HashMap<u64, PhysicalPosition<f64>>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, touch: &Touch) -> TouchInput {
        self.translate_parts(touch.id, touch.phase, touch.location)
    }

    /**
     * Updates the live contact set and maps the event.
     *
     * Lifting any finger ends the gesture, as browsers do with `touchend`.
     */
    pub fn translate_parts(
        &mut self,
        id: u64,
        phase: TouchPhase,
        location: PhysicalPosition<f64>,
    ) -> TouchInput {
        let (x, y) = (location.x as f32, location.y as f32);
        match phase {
            TouchPhase::Started => {
                self.contacts.insert(id, location);
                TouchInput::Start {
                    contacts: self.contacts.len(),
                    x,
                    y,
                }
            }
            TouchPhase::Moved => {
                self.contacts.insert(id, location);
                TouchInput::Move {
                    contacts: self.contacts.len(),
                    x,
                    y,
                }
            }
            TouchPhase::Ended => {
                self.contacts.remove(&id);
                TouchInput::End
            }
            TouchPhase::Cancelled => {
                self.contacts.remove(&id);
                TouchInput::Cancel
            }
        }
    }

    pub fn contacts(&self) -> usize {
        self.contacts.len()
    }
}
