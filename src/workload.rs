//! Placeholder workloads: random letter insertion and random recolouring.

use rand::rngs::StdRng;
use rand::Rng;

use crate::dispatch::Task;
use crate::surface::{Argb, SurfaceHandle, WidgetId, BUTTON_COUNT};
use crate::Result;

/// ASCII letters, one byte each.
pub const LETTERS: &[u8; 52] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub fn random_letter(rng: &mut impl Rng) -> char {
    char::from(LETTERS[rng.gen_range(0..LETTERS.len())])
}

pub fn random_color(rng: &mut impl Rng) -> Argb {
    Argb::opaque(rng.gen_range(0..0x100_0000))
}

pub fn random_widget(rng: &mut impl Rng) -> WidgetId {
    WidgetId::wrapping(rng.gen_range(0..BUTTON_COUNT))
}

/// Insert `letter` at `floor(fraction * (len + 1))` and put the cursor there.
///
/// The read and the write are separate surface calls; under the racy direct
/// mode another thread can slip in between them.
pub fn insert_letter(surface: &SurfaceHandle, letter: char, fraction: f64) -> Result<()> {
    let text = surface.get_text()?;
    let len = text.chars().count();
    let pos = ((fraction.clamp(0.0, 1.0) * (len + 1) as f64) as usize).min(len);

    let mut updated: String = text.chars().take(pos).collect();
    updated.push(letter);
    updated.extend(text.chars().skip(pos));

    surface.set_text(updated)?;
    surface.set_selection(pos)
}

pub fn recolor(surface: &SurfaceHandle, widget: WidgetId, color: Argb) -> Result<()> {
    surface.set_widget_color(widget, color)
}

/// Work generator for the text worker. Random choices are rolled when the
/// task is built; the position is resolved against the text at run time.
pub fn inserter(surface: SurfaceHandle, mut rng: StdRng) -> impl FnMut() -> Task + Send {
    move || {
        let letter = random_letter(&mut rng);
        let fraction: f64 = rng.gen();
        let surface = surface.clone();
        Task::fallible(move || insert_letter(&surface, letter, fraction)).labeled("insert-letter")
    }
}

/// Work generator for the button worker.
pub fn colorer(surface: SurfaceHandle, mut rng: StdRng) -> impl FnMut() -> Task + Send {
    move || {
        let widget = random_widget(&mut rng);
        let color = random_color(&mut rng);
        let surface = surface.clone();
        Task::fallible(move || recolor(&surface, widget, color)).labeled("recolor")
    }
}
