pub mod candle;
pub mod dividend;
pub mod instrument;
