//! Ingestion pipeline integration tests
//!
//! Runs Load -> Chunk -> Embed -> Build -> Persist against real files in a
//! temp directory with a deterministic embedder.

mod common;

use common::{HashEmbedder, FAQ, HANDBOOK};
use docqa::chunker::Chunker;
use docqa::embedding::BatchEmbedder;
use docqa::index::{IndexOptions, VectorIndex};
use docqa::ingest::{IngestError, IngestPipeline, IngestStage};
use docqa::loader::FsLoader;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn extensions() -> Vec<String> {
    vec!["pdf".to_string(), "md".to_string(), "txt".to_string()]
}

fn pipeline(embedder: HashEmbedder, max_size: usize, overlap: usize) -> IngestPipeline {
    IngestPipeline::new(
        // A pdftotext that cannot exist, so every PDF fails to load
        Arc::new(FsLoader::with_pdftotext("/nonexistent/pdftotext").unwrap()),
        Chunker::new(max_size, overlap).unwrap(),
        BatchEmbedder::new(Arc::new(embedder), 4, 2),
        IndexOptions::default(),
    )
}

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("handbook.md"), HANDBOOK).unwrap();
    fs::write(dir.join("nested").join("faq.txt"), FAQ).unwrap();
    fs::write(dir.join("notes.docx"), "ignored by extension").unwrap();
}

#[tokio::test]
async fn test_ingest_builds_queryable_index() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let index_dir = temp.path().join("index");
    write_corpus(&data);
    fs::write(data.join("broken.pdf"), b"%PDF-1.4 not really").unwrap();

    let report = pipeline(HashEmbedder::new(), 200, 40)
        .run_dir(&data, &extensions(), true, &index_dir)
        .await
        .unwrap();

    assert_eq!(report.sources_seen, 3);
    assert_eq!(report.documents_loaded, 2);
    assert_eq!(report.sources_failed.len(), 1);
    assert!(report.sources_failed[0].path.ends_with("broken.pdf"));
    assert!(report.chunks > 2);
    assert_eq!(report.dimension, common::DIM);

    let index = VectorIndex::load(&index_dir).unwrap();
    assert_eq!(index.build_id(), report.build_id);
    assert_eq!(index.len(), report.chunks);
    assert_eq!(index.embedding_model(), Some("hash-bow"));

    // Every query word appears only in the payments paragraph
    let query = HashEmbedder::vector("escrow funds released contractor stage inspection");
    let hits = index.query(&query, 3).unwrap();
    assert_eq!(hits.len(), 3);
    let escrow = hits
        .iter()
        .find(|h| h.chunk.text.contains("escrow"))
        .expect("escrow chunk retrieved");
    assert!(escrow.chunk.source_id.ends_with("handbook.md"));
    assert!(escrow.score > 0.0);
}

#[tokio::test]
async fn test_chunks_respect_size_limit() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("long.txt"), "construct ".repeat(250)).unwrap();

    let report = pipeline(HashEmbedder::new(), 1000, 200)
        .run_dir(&data, &extensions(), false, &temp.path().join("index"))
        .await
        .unwrap();
    assert_eq!(report.chunks, 3);

    let index = VectorIndex::load(&temp.path().join("index")).unwrap();
    for entry in index.entries() {
        assert!(entry.chunk.char_len() <= 1000);
    }
}

#[tokio::test]
async fn test_empty_corpus_halts() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("blank.md"), "   \n\n  ").unwrap();

    let err = pipeline(HashEmbedder::new(), 200, 40)
        .run_dir(&data, &extensions(), true, &temp.path().join("index"))
        .await
        .unwrap_err();

    match err {
        IngestError::EmptyCorpus {
            stage,
            documents,
            failed,
        } => {
            assert_eq!(stage, IngestStage::Chunk);
            assert_eq!(documents, 0);
            assert_eq!(failed, 1);
        }
        other => panic!("expected EmptyCorpus, got {}", other),
    }
    assert!(!temp.path().join("index").exists());
}

#[tokio::test]
async fn test_missing_source_dir() {
    let temp = TempDir::new().unwrap();
    let err = pipeline(HashEmbedder::new(), 200, 40)
        .run_dir(&temp.path().join("nope"), &extensions(), true, &temp.path().join("index"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Discover { .. }));
}

#[tokio::test]
async fn test_embedding_failure_is_fatal_and_keeps_previous_index() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let index_dir = temp.path().join("index");
    write_corpus(&data);

    let first = pipeline(HashEmbedder::poisoned("POISON"), 200, 40)
        .run_dir(&data, &extensions(), true, &index_dir)
        .await
        .unwrap();

    fs::write(data.join("zz_bad.txt"), "This chunk contains POISON and cannot be embedded.").unwrap();
    let err = pipeline(HashEmbedder::poisoned("POISON"), 200, 40)
        .run_dir(&data, &extensions(), true, &index_dir)
        .await
        .unwrap_err();

    match &err {
        IngestError::Embedding {
            stage, first_chunk, ..
        } => {
            assert_eq!(*stage, IngestStage::Embed);
            assert!(!first_chunk.is_empty());
        }
        other => panic!("expected Embedding error, got {}", other),
    }
    assert!(err.to_string().contains("model crashed"));

    let index = VectorIndex::load(&index_dir).unwrap();
    assert_eq!(index.build_id(), first.build_id);
}

#[tokio::test]
async fn test_reingest_replaces_index() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let index_dir = temp.path().join("index");
    write_corpus(&data);

    let first = pipeline(HashEmbedder::new(), 200, 40)
        .run_dir(&data, &extensions(), true, &index_dir)
        .await
        .unwrap();

    fs::remove_file(data.join("nested").join("faq.txt")).unwrap();
    let second = pipeline(HashEmbedder::new(), 200, 40)
        .run_dir(&data, &extensions(), true, &index_dir)
        .await
        .unwrap();

    assert_ne!(first.build_id, second.build_id);
    assert!(second.chunks < first.chunks);

    let entries_files = fs::read_dir(&index_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("entries-"))
        .count();
    assert_eq!(entries_files, 1);
}
