//! Reads hand-filled bubble answer sheets: samples the darkness of each
//! bubble on a binarized scan and decides which bubble of every question and
//! student-number digit was marked, with a warning for each one it cannot
//! read confidently.

pub mod answer_key;
pub mod decision;
pub mod fill_grid;
pub mod kornia;
pub mod layout;
pub mod plot_overlay;
pub mod reader;
pub mod sheet_decode;
#[doc(hidden)]
pub mod test_sheet_gen;

pub use decision::{Selection, Thresholds, pick_index};
pub use fill_grid::{FillMatrix, sample_region};
pub use layout::{Layout, LayoutError, Region};
pub use reader::{DecoderConfig, ReadError, ReadOptions, SheetOutput, SheetReader};
pub use sheet_decode::{DecodedReport, decode_form};
