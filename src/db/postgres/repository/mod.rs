pub mod candle_repository;
pub mod dividend_repository;
pub mod instrument_repository;
pub mod partition_repository;
