//! Return series ingestion and alignment

pub mod align;
pub mod series;
pub mod store;

pub use align::{align_series, ReturnMatrix};
pub use series::{AssetReturnSeries, ReturnObservation};
pub use store::ReturnSeriesStore;
