pub mod cli;
pub mod error;
pub mod pipeline;

pub mod commands {
    pub mod compress;
}

pub mod core {
    pub mod block;
    pub mod calibration;
    pub mod reference;
    pub mod variant;
}

pub mod io {
    pub mod bed_reader;
    pub mod call_reader;
    pub mod gvcf_writer;
    pub mod readers;
    pub mod region;
}

pub mod utils {
    pub mod util;
    pub mod util_intern;
}

pub mod constants;

pub use constants::*;
