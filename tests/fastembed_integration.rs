/// End-to-end test with the real local embedding model
///
/// Ingests a small corpus with all-MiniLM-L6-v2, reloads the persisted index
/// and checks that semantically related questions retrieve the right source.
use docqa::config::Config;
use docqa::embedding::{self, BatchEmbedder};
use docqa::index::{IndexHandle, VectorIndex};
use docqa::ingest::IngestPipeline;
use docqa::loader::FsLoader;
use docqa::retrieval::QueryPipeline;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
#[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
async fn test_fastembed_ingest_and_retrieve() {
    println!("\n=== FastEmbed Integration Test ===\n");

    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let index_dir = temp.path().join("index");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("payments.md"),
        "Payments are held in escrow. The contractor receives funds only after each stage \
         of construction is inspected and approved by the homeowner.",
    )
    .unwrap();
    std::fs::write(
        data.join("materials.txt"),
        "The Pinnacle package uses Tata steel and Asian Paints Royale for interior walls.",
    )
    .unwrap();

    let config = Config::default();
    let provider = embedding::from_config(&config.embedding).expect("embedding model");
    println!("✓ Embedding provider initialized: {}", provider.model_name());

    let pipeline = IngestPipeline::new(
        Arc::new(FsLoader::new().unwrap()),
        config.chunker().unwrap(),
        BatchEmbedder::new(provider.clone(), 8, 2),
        config.index_options().unwrap(),
    );
    let report = pipeline
        .run_dir(&data, &config.corpus.extensions, true, &index_dir)
        .await
        .unwrap();
    println!("✓ Ingested {} chunks", report.chunks);
    assert_eq!(report.dimension, 384);

    let index = VectorIndex::load_with(
        &index_dir,
        config.search_strategy().unwrap(),
        &config.index_expectation_for(provider.as_ref()).unwrap(),
    )
    .unwrap();

    let query = QueryPipeline::new(
        provider,
        Arc::new(IndexHandle::new(index)),
        None,
        config.prompt_template().unwrap(),
        config.query_settings(),
    );

    let hits = query.retrieve("When does the builder get paid?", 1).await.unwrap();
    println!("✓ Top hit: {} ({:.3})", hits[0].provenance, hits[0].score);
    assert!(hits[0].provenance.source_id.ends_with("payments.md"));

    let hits = query.retrieve("Which brand of steel is used?", 1).await.unwrap();
    assert!(hits[0].provenance.source_id.ends_with("materials.txt"));
}
