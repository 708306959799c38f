pub mod tushare_api;
