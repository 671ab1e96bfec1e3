//! Redirect resolver
//!
//! Intercepts locations ending in the redirect extension and serves them from
//! the cache bin carried by [`ReadOptions`].

use crate::bin::{CacheBin, CacheObject};
use crate::error::BinError;
use crate::key::{has_redirect_extension, name_less_extension};
use crate::loader::{LoadOutcome, MissReason, ReaderWriter};
use crate::options::ReadOptions;
use scenebin_graph::ImageRef;
use tracing::{debug, warn};

/// Loader that turns synthetic locators into cache bin lookups
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectResolver;

impl RedirectResolver {
    /// Key for a handled location, `None` if the location is not a redirect
    #[must_use]
    pub fn key_for(location: &str) -> Option<&str> {
        has_redirect_extension(location).then(|| name_less_extension(location))
    }

    fn lookup<T>(
        location: &str,
        options: &ReadOptions,
        read: impl FnOnce(&dyn CacheBin, &str) -> Result<Option<T>, BinError>,
    ) -> LoadOutcome<T> {
        let Some(key) = Self::key_for(location) else {
            return LoadOutcome::NotHandled;
        };
        let Some(bin) = options.cache_bin() else {
            debug!(%location, "no cache bin in read options");
            return LoadOutcome::NotFound(MissReason::MissingAmbientBin);
        };
        match read(bin.as_ref(), key) {
            Ok(Some(value)) => LoadOutcome::Found(value),
            Ok(None) => {
                debug!(%key, "redirect target not in bin");
                LoadOutcome::NotFound(MissReason::KeyNotFound)
            }
            Err(BinError::WrongKind { found, .. }) => {
                warn!(%key, %found, "redirect target has wrong kind");
                LoadOutcome::NotFound(MissReason::WrongKind)
            }
            Err(err) => {
                warn!(%key, error = %err, "redirect target unreadable");
                LoadOutcome::NotFound(MissReason::Unreadable)
            }
        }
    }
}

impl ReaderWriter for RedirectResolver {
    fn name(&self) -> &str {
        "redirect"
    }

    fn read_object(&self, location: &str, options: &ReadOptions) -> LoadOutcome<CacheObject> {
        Self::lookup(location, options, |bin, key| bin.read_object(key, options))
    }

    fn read_image(&self, location: &str, options: &ReadOptions) -> LoadOutcome<ImageRef> {
        let outcome = Self::lookup(location, options, |bin, key| bin.read_image(key, options));
        match outcome {
            LoadOutcome::Found(image) if !image.has_data() => {
                warn!(%location, "redirect target holds no payload");
                LoadOutcome::NotFound(MissReason::Unreadable)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKey;
    use crate::memory::MemoryCacheBin;
    use crate::options::{Metadata, WriteOptions};
    use scenebin_graph::{Image, Node};
    use std::sync::Arc;

    fn bin_with_image(key: &CacheKey) -> Arc<dyn CacheBin> {
        let bin = MemoryCacheBin::new("tiles");
        let image = Image::new(key.locator().as_str())
            .with_data(vec![1u8, 2, 3])
            .into_ref();
        bin.write(
            key.as_str(),
            &image.into(),
            &Metadata::new(),
            &WriteOptions::new().with_inline_images(),
        )
        .unwrap();
        Arc::new(bin)
    }

    #[test]
    fn declines_other_extensions() {
        let options = ReadOptions::new();
        assert!(RedirectResolver.read_image("sky.png", &options).is_not_handled());
        assert!(RedirectResolver.read_object("scene.osgb", &options).is_not_handled());
        assert_eq!(RedirectResolver::key_for("scene1.CacheBin"), Some("scene1"));
    }

    #[test]
    fn missing_bin_is_not_found() {
        let outcome = RedirectResolver.read_image("i_0011223344556677.cachebin", &ReadOptions::new());
        assert!(matches!(outcome, LoadOutcome::NotFound(MissReason::MissingAmbientBin)));
    }

    #[test]
    fn resolves_image_through_bin() {
        let key = CacheKey::for_image("sky.png");
        let options = ReadOptions::new().with_bin(bin_with_image(&key));

        let image = RedirectResolver
            .read_image(key.locator().as_str(), &options)
            .found()
            .unwrap();
        assert_eq!(image.data().as_deref(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn absent_key_is_not_found() {
        let key = CacheKey::for_image("sky.png");
        let options = ReadOptions::new().with_bin(bin_with_image(&key));

        let outcome = RedirectResolver.read_image("i_ffffffffffffffff.cachebin", &options);
        assert!(matches!(outcome, LoadOutcome::NotFound(MissReason::KeyNotFound)));
    }

    #[test]
    fn wrong_kind_is_not_found() {
        let bin = MemoryCacheBin::new("tiles");
        bin.write(
            "scene1",
            &Node::new("root").into_ref().into(),
            &Metadata::new(),
            &WriteOptions::new(),
        )
        .unwrap();
        let options = ReadOptions::new().with_bin(Arc::new(bin));

        let outcome = RedirectResolver.read_image("scene1.cachebin", &options);
        assert!(matches!(outcome, LoadOutcome::NotFound(MissReason::WrongKind)));

        let object = RedirectResolver.read_object("scene1.cachebin", &options);
        assert!(matches!(object.found(), Some(CacheObject::Node(_))));
    }
}
