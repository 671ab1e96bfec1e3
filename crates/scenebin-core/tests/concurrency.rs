//! Concurrent caching of graphs sharing images

use scenebin_core::{ExternalResourceExtractor, ExtractionLocks, WriteOrchestrator};
use scenebin_graph::Node;
use scenebin_store::{CacheBin, CacheKey, Metadata, ReadOptions, WriteOptions};
use scenebin_test_utils::{image, textured_node, RecordingBin};
use std::sync::{Arc, Barrier};
use std::thread;

const ROUNDS: usize = 50;

fn orchestrator(bin: Arc<dyn CacheBin>, shards: usize) -> WriteOrchestrator {
    let extractor = ExternalResourceExtractor::default().with_locks(Arc::new(ExtractionLocks::new(shards)));
    WriteOrchestrator::new(bin).with_extractor(extractor)
}

#[test]
fn shared_image_object_stored_once() {
    for round in 0..ROUNDS {
        let recording = Arc::new(RecordingBin::new("tiles"));
        let orchestrator = orchestrator(recording.clone(), 1 + round % 8);
        let shared = image("shared.png", 0x42);
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["scene-a", "scene-b"]
            .into_iter()
            .map(|key| {
                let orchestrator = orchestrator.clone();
                let barrier = Arc::clone(&barrier);
                let graph = Node::new(key)
                    .with_child(textured_node("child", &[shared.clone()]))
                    .into_ref();
                thread::spawn(move || {
                    barrier.wait();
                    orchestrator.write_node(key, &graph, &Metadata::new(), &WriteOptions::new())
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().succeeded());
        }

        let key = CacheKey::for_image("shared.png");
        assert_eq!(recording.writes_for(key.as_str()), 1, "round {round}");
        assert_eq!(shared.file_name(), key.locator().as_str());

        let stored = recording.read_image(key.as_str(), &ReadOptions::new()).unwrap().unwrap();
        assert_eq!(stored.data().as_deref(), Some(&[0x42u8; 16][..]));
    }
}

#[test]
fn distinct_images_with_same_path_stored_once() {
    for round in 0..ROUNDS {
        let recording = Arc::new(RecordingBin::new("tiles"));
        let orchestrator = orchestrator(recording.clone(), 4);
        let threads = 4;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let orchestrator = orchestrator.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let graph = textured_node("root", &[image("common.png", 7), image(&format!("own-{i}.png"), 9)]);
                    barrier.wait();
                    orchestrator.write_node(&format!("scene-{i}"), &graph, &Metadata::new(), &WriteOptions::new())
                })
            })
            .collect();

        let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(reports.iter().all(|report| report.succeeded()));

        let common = CacheKey::for_image("common.png");
        assert_eq!(recording.writes_for(common.as_str()), 1, "round {round}");
        let cached: usize = reports.iter().map(|report| report.extract.already_cached).sum();
        assert_eq!(cached, threads - 1);
        // One common image, one private image per thread, one graph per thread
        assert_eq!(recording.total_writes(), 1 + 2 * threads);
    }
}

#[test]
fn readers_and_writers_interleave() {
    let recording: Arc<dyn CacheBin> = Arc::new(RecordingBin::new("tiles"));
    let orchestrator = orchestrator(recording.clone(), 8);
    let graph = textured_node("root", &[image("sky.png", 1)]);
    assert!(orchestrator
        .write_node("scene1", &graph, &Metadata::new(), &WriteOptions::new())
        .succeeded());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let orchestrator = orchestrator.clone();
            let reader = scenebin_core::GraphReader::new(Arc::clone(&recording));
            thread::spawn(move || {
                for n in 0..20 {
                    if i % 2 == 0 {
                        let graph = textured_node("root", &[image(&format!("t{i}-{n}.png"), 3)]);
                        orchestrator.write_node(&format!("s{i}-{n}"), &graph, &Metadata::new(), &WriteOptions::new());
                    } else {
                        let loaded = reader.read_node("scene1", ReadOptions::new()).unwrap().unwrap();
                        let texture = loaded.state().unwrap().texture(0).unwrap();
                        assert_eq!(texture.images()[0].data().as_deref(), Some(&[1u8; 16][..]));
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
