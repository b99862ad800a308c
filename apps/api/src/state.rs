use amora_application::GalleryService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gallery_service: GalleryService,
}
