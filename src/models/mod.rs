pub mod element;
pub mod note;

pub use element::{ElementRole, FocusedElement, WindowFrame};
pub use note::Note;
