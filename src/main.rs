use docqa::cli::{Cli, Commands, ConfigAction};
use docqa::config::Config;
use docqa::embedding::{self, BatchEmbedder};
use docqa::error::{DocqaError, Result};
use docqa::index::{IndexError, IndexHandle, IndexManifest, VectorIndex};
use docqa::ingest::IngestPipeline;
use docqa::llm;
use docqa::loader::FsLoader;
use docqa::retrieval::{QueryOutcome, QueryPipeline, ScoredChunk};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Preview length for interactive chat context
const CHAT_PREVIEW_CHARS: usize = 300;
/// Preview length for eval runs
const EVAL_PREVIEW_CHARS: usize = 200;

fn main() {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // API keys may live in a .env file next to the corpus
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    if let Err(e) = run(cli) {
        report_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest { source, index } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ingest(&config, source, index)?;
        }
        Commands::Ask { question, k, json } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ask(&config, &question, k, json)?;
        }
        Commands::Search { query, k, json } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_search(&config, &query, k, json)?;
        }
        Commands::Chat { k } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_chat(&config, k)?;
        }
        Commands::Eval { file, k } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_eval(&config, &file, k)?;
        }
        Commands::Status => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_status(&config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "docqa=debug" } else { "docqa=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn report_error(error: &DocqaError) {
    match error {
        DocqaError::ConfigValidation { errors } => {
            eprintln!("✗ Configuration is invalid:");
            for e in errors {
                eprintln!("  - {}: {}", e.path, e.message);
            }
        }
        other => eprintln!("✗ {}", other),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| DocqaError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn cmd_ingest(config: &Config, source: Option<PathBuf>, index: Option<PathBuf>) -> Result<()> {
    let source_dir = expand_path(&source.unwrap_or_else(|| config.corpus.source_dir.clone()))?;
    let index_dir = expand_path(&index.unwrap_or_else(|| config.index.path.clone()))?;

    if !source_dir.exists() {
        std::fs::create_dir_all(&source_dir).map_err(|e| DocqaError::Io {
            source: e,
            context: format!("Failed to create source directory: {:?}", source_dir),
        })?;
        println!("Created {}", source_dir.display());
        println!("Put your PDF, Markdown or text files there and run `docqa ingest` again.");
        return Ok(());
    }

    let loader = Arc::new(FsLoader::with_pdftotext(&config.corpus.pdftotext)?);
    let chunker = config.chunker()?;
    let provider = embedding::from_config(&config.embedding)?;
    let embedder = BatchEmbedder::new(
        provider,
        config.embedding.batch_size,
        config.embedding.concurrency,
    );
    let pipeline = IngestPipeline::new(loader, chunker, embedder, config.index_options()?);

    let extensions: Vec<String> = config
        .corpus
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let rt = runtime()?;
    let report = rt.block_on(pipeline.run_dir(
        &source_dir,
        &extensions,
        config.corpus.recursive,
        &index_dir,
    ))?;

    println!("✓ Index built");
    println!("  Sources:   {}", report.sources_seen);
    println!("  Documents: {}", report.documents_loaded);
    println!("  Chunks:    {} ({} dimensions)", report.chunks, report.dimension);
    println!("  Build:     {}", report.build_id);
    println!("  Location:  {}", report.index_path.display());
    println!("  Took:      {}ms", report.duration_ms);

    if !report.sources_failed.is_empty() {
        println!("\n⚠ {} sources skipped:", report.sources_failed.len());
        for failure in &report.sources_failed {
            println!("  - {}: {}", failure.path.display(), failure.reason);
        }
    }

    Ok(())
}

/// Load the index and wire up the query pipeline
fn build_query_pipeline(config: &Config) -> Result<QueryPipeline> {
    let index_dir = expand_path(&config.index.path)?;
    let embedder = embedding::from_config(&config.embedding)?;
    let index = VectorIndex::load_with(
        &index_dir,
        config.search_strategy()?,
        &config.index_expectation_for(embedder.as_ref())?,
    )?;
    tracing::info!(
        "Loaded index {} ({} chunks)",
        index.build_id(),
        index.len()
    );

    let llm = llm::from_config(&config.llm)?;

    Ok(QueryPipeline::new(
        embedder,
        Arc::new(IndexHandle::new(index)),
        llm,
        config.prompt_template()?,
        config.query_settings(),
    ))
}

fn cmd_ask(config: &Config, question: &str, k: Option<usize>, json: bool) -> Result<()> {
    let pipeline = build_query_pipeline(config)?;
    let k = k.unwrap_or(config.retrieval.k);

    let rt = runtime()?;
    let outcome = rt.block_on(pipeline.ask_with_k(question, k))?;

    if json {
        let value = serde_json::json!({
            "question": &outcome.question,
            "answer": outcome.answer(),
            "error": outcome.generation.as_ref().err().map(|e| e.to_string()),
            "retrieved": &outcome.retrieved,
        });
        print_json(&value)?;
        return Ok(());
    }

    print_answer(&outcome);
    println!("\nSources:");
    for (i, chunk) in outcome.retrieved.iter().enumerate() {
        println!("  [{}] {} (score {:.3})", i + 1, chunk.provenance, chunk.score);
    }
    Ok(())
}

fn cmd_search(config: &Config, query: &str, k: Option<usize>, json: bool) -> Result<()> {
    let pipeline = build_query_pipeline(config)?;
    let k = k.unwrap_or(config.retrieval.k);

    let rt = runtime()?;
    let results = rt.block_on(pipeline.retrieve(query, k))?;

    if json {
        let value = serde_json::to_value(&results).map_err(|e| DocqaError::Json {
            source: e,
            context: "Failed to serialize search results".to_string(),
        })?;
        print_json(&value)?;
        return Ok(());
    }

    if results.is_empty() {
        println!("No results (is the index empty?)");
        return Ok(());
    }
    print_context(&results, CHAT_PREVIEW_CHARS);
    Ok(())
}

fn cmd_chat(config: &Config, k: Option<usize>) -> Result<()> {
    let pipeline = build_query_pipeline(config)?;
    let k = k.unwrap_or(config.retrieval.k);
    let rt = runtime()?;

    if !pipeline.has_llm() {
        println!("⚠ No language model configured; showing retrieved context only.");
    }
    println!("Ask a question about your documents (`exit` to quit, `:reload` to reload the index).");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.map_err(|e| DocqaError::Io {
            source: e,
            context: "Failed to read from stdin".to_string(),
        })?;
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" | "q" => break,
            ":reload" => {
                match pipeline.index().reload(
                    &expand_path(&config.index.path)?,
                    config.search_strategy()?,
                    &config.index_expectation_for(pipeline.embedder().as_ref())?,
                ) {
                    Ok(index) => println!("✓ Reloaded index {} ({} chunks)", index.build_id(), index.len()),
                    Err(e) => println!("✗ Reload failed, keeping current index: {}", e),
                }
                continue;
            }
            _ => {}
        }

        match rt.block_on(pipeline.ask_with_k(input, k)) {
            Ok(outcome) => {
                println!("\n--- Retrieved Context ---");
                print_context(&outcome.retrieved, CHAT_PREVIEW_CHARS);
                println!("-------------------------\n");
                if pipeline.has_llm() {
                    print_answer(&outcome);
                }
            }
            Err(e) => println!("✗ {}", e),
        }
    }

    Ok(())
}

fn cmd_eval(config: &Config, file: &Path, k: Option<usize>) -> Result<()> {
    let content = std::fs::read_to_string(file).map_err(|e| DocqaError::Io {
        source: e,
        context: format!("Failed to read questions file: {:?}", file),
    })?;
    let questions: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let pipeline = build_query_pipeline(config)?;
    let k = k.unwrap_or(config.retrieval.k);
    let rt = runtime()?;

    if !pipeline.has_llm() {
        println!("⚠ No language model configured; skipping generation.");
    }
    println!("Running {} queries...\n", questions.len());

    let mut failed = 0;
    for question in &questions {
        println!("{}", "=".repeat(80));
        println!("Query: {}", question);
        println!("{}", "-".repeat(80));

        let retrieved = if pipeline.has_llm() {
            match rt.block_on(pipeline.ask_with_k(question, k)) {
                Ok(outcome) => {
                    print_context(&outcome.retrieved, EVAL_PREVIEW_CHARS);
                    println!();
                    print_answer(&outcome);
                    if outcome.generation.is_err() {
                        failed += 1;
                    }
                    continue;
                }
                Err(e) => Err(e),
            }
        } else {
            rt.block_on(pipeline.retrieve(question, k))
        };

        match retrieved {
            Ok(chunks) => print_context(&chunks, EVAL_PREVIEW_CHARS),
            Err(e) => {
                failed += 1;
                println!("✗ {}", e);
            }
        }
    }

    println!("{}", "=".repeat(80));
    println!(
        "Ran {} queries, {} without an answer",
        questions.len(),
        failed
    );
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    let index_dir = expand_path(&config.index.path)?;

    println!("docqa Status");
    println!("============");
    println!("\nIndex: {}", index_dir.display());

    let manifest = match IndexManifest::read(&index_dir) {
        Ok(manifest) => manifest,
        Err(IndexError::IndexNotFound { .. }) => {
            println!("  Not built yet (run `docqa ingest`)");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("  Build:      {}", manifest.build_id);
    println!(
        "  Created:    {}",
        manifest.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  Chunks:     {}", manifest.entry_count);
    println!("  Dimension:  {}", manifest.dimension);
    println!("  Metric:     {}", manifest.metric);
    println!(
        "  Model:      {}",
        manifest.embedding_model.as_deref().unwrap_or("unknown")
    );
    println!("  Checksum:   {}", manifest.checksum);

    println!("\nEmbedding: {} ({})", config.embedding.model, config.embedding.provider);
    if config.llm.enabled {
        println!("LLM:       {} ({})", config.llm.model, config.llm.provider);
    } else {
        println!("LLM:       disabled");
    }
    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| DocqaError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = match profile {
                Some(profile) => Config::load_with_profile(&path, &profile)?,
                None => Config::load(&path)?,
            };
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    Config::resolve(config_path.as_deref(), profile.as_deref())
}

fn print_context(chunks: &[ScoredChunk], preview_chars: usize) {
    for (i, chunk) in chunks.iter().enumerate() {
        println!(
            "[{}] {} (score {:.3})",
            i + 1,
            chunk.provenance,
            chunk.score
        );
        println!("    {}", chunk.preview(preview_chars).replace('\n', " "));
    }
}

fn print_answer(outcome: &QueryOutcome) {
    match &outcome.generation {
        Ok(answer) => println!("Answer:\n{}", answer),
        Err(e) => println!("⚠ No answer: {}", e),
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| DocqaError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })?;
    println!("{}", text);
    Ok(())
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| DocqaError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| DocqaError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
