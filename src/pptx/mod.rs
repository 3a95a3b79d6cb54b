pub mod fill;
pub mod package;
pub mod scan;
pub mod slide;
pub mod xml;

pub use fill::{escape_markup, fill_slide, substitute_markers};
pub use package::{Compression, CompressionMode, PptxPackage};
pub use scan::extract_template_inputs;
pub use slide::{locate, slide_count, slide_part_name, ElementKind, SlideElement, SlidePart};
