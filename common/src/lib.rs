pub mod error;

pub mod storage {
    pub mod db;
    pub mod types;
}

pub mod utils {
    pub mod completion;
    pub mod config;
    pub mod embedding;
}
