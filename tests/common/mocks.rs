//! Mock version of the `Extractor` seam.
use mockall::mock;

use batimento::{
    processor::extract::{Extraction, Extractor},
    BatchError,
};

mock! {
    pub Extractor {}
    impl Extractor for Extractor {
        fn name(&self) -> &str;
        fn extract(&self) -> Result<Extraction, BatchError>;
    }
}
