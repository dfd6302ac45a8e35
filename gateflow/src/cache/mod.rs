//! Small persistent lookup caches.

mod city_codes;

pub use city_codes::CityCodeCache;
