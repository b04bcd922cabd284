pub mod city_store;

pub use city_store::{CityStore, LIST_ALL_LIMIT, StoreError, StoreResult};
