//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_image_backend;
mod in_memory_image_store;
mod in_memory_rate_limit_repository;
mod local_image_backend;
mod postgres_profile_image_store;
mod postgres_rate_limit_repository;
mod raster_codec;
mod redis_rate_limit_repository;

pub use http_image_backend::HttpImageBackend;
pub use in_memory_image_store::InMemoryImageStore;
pub use in_memory_rate_limit_repository::InMemoryRateLimitRepository;
pub use local_image_backend::LocalImageBackend;
pub use postgres_profile_image_store::PostgresProfileImageStore;
pub use postgres_rate_limit_repository::PostgresRateLimitRepository;
pub use raster_codec::RasterImageCodec;
pub use redis_rate_limit_repository::RedisRateLimitRepository;
