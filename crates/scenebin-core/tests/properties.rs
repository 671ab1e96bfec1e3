//! Property tests for key derivation and extraction

use proptest::prelude::*;
use scenebin_core::{ExternalResourceExtractor, ExtractionLocks, GraphReader, WriteOrchestrator};
use scenebin_graph::Node;
use scenebin_store::{CacheBin, CacheKey, Metadata, ReadOptions, ResourceKind, SyntheticLocator, WriteOptions};
use scenebin_test_utils::{image, textured_node, RecordingBin};
use std::collections::BTreeSet;
use std::sync::Arc;

fn orchestrator(bin: Arc<dyn CacheBin>) -> WriteOrchestrator {
    let extractor = ExternalResourceExtractor::default().with_locks(Arc::new(ExtractionLocks::new(8)));
    WriteOrchestrator::new(bin).with_extractor(extractor)
}

proptest! {
    #[test]
    fn keys_are_pure(path in ".{1,64}") {
        let first = CacheKey::for_image(&path);
        let second = CacheKey::for_image(&path);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.kind(), ResourceKind::Image);
        prop_assert_eq!(first.as_str().parse::<CacheKey>().unwrap(), first.clone());
        prop_assert_eq!(SyntheticLocator::parse(first.locator().as_str()).map(|l| l.key()), Some(first));
    }

    #[test]
    fn distinct_paths_give_distinct_keys(a in "[a-z/]{1,32}\\.png", b in "[a-z/]{1,32}\\.png") {
        prop_assume!(a != b);
        prop_assert_ne!(CacheKey::for_image(&a), CacheKey::for_image(&b));
    }

    #[test]
    fn every_distinct_path_written_once(paths in prop::collection::vec("[a-c]{1,2}\\.png", 1..12)) {
        let recording = Arc::new(RecordingBin::new("tiles"));
        let root = Node::new("root");
        for (i, path) in paths.iter().enumerate() {
            root.add_child(textured_node(&format!("n{i}"), &[image(path, 1)]));
        }
        let root = root.into_ref();

        let report = orchestrator(recording.clone()).write_node("scene", &root, &Metadata::new(), &WriteOptions::new());
        prop_assert!(report.succeeded());

        let distinct: BTreeSet<&String> = paths.iter().collect();
        for path in &distinct {
            prop_assert_eq!(recording.writes_for(CacheKey::for_image(path).as_str()), 1);
        }
        prop_assert_eq!(recording.total_writes(), distinct.len() + 1);
        prop_assert_eq!(report.extract.written + report.extract.already_cached, paths.len());

        let loaded = GraphReader::new(recording).read_node("scene", ReadOptions::new()).unwrap().unwrap();
        for child in loaded.children() {
            let texture = child.state().unwrap().texture(0).unwrap();
            prop_assert!(texture.images()[0].has_data());
        }
    }
}
