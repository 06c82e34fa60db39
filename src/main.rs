use anyhow::Context;
use std::path::Path;
use std::process;
use std::rc::Rc;

use xml_ormz::cli::{DumpArgs, InferArgs, MapArgs, SchemaFormat};
use xml_ormz::{
    Cli, Command, Config, ConfigError, ConfigManager, Document, ErrorReporter, FileDiscovery,
    MappingEngine, MappingError, Mapper, Output, SchemaLoader, SchemaRegistry, TracingReporter,
    VerbosityLevel, infer_schema, to_xml_string,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(2);
    }

    let config = match ConfigManager::load_config(&cli).await {
        Ok(config) => config,
        Err(err) => {
            ErrorReporter::new(cli.verbosity()).report_config_error(&err);
            process::exit(2);
        }
    };

    let verbosity = if cli.debug {
        VerbosityLevel::Debug
    } else {
        config.verbosity()
    };
    init_tracing(verbosity);

    let outcome = match &cli.command {
        Command::Map(args) => run_map(args, &config, verbosity).await,
        Command::Dump(args) => run_dump(args).await,
        Command::Infer(args) => run_infer(args).await,
    };

    match outcome {
        Ok(code) => process::exit(code),
        Err(err) => {
            report_failure(&err, verbosity);
            process::exit(1);
        }
    }
}

fn init_tracing(verbosity: VerbosityLevel) {
    tracing_subscriber::fmt()
        .with_max_level(verbosity.tracing_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report_failure(err: &anyhow::Error, verbosity: VerbosityLevel) {
    let reporter = ErrorReporter::new(verbosity);
    if let Some(mapping) = err.downcast_ref::<MappingError>() {
        reporter.report_mapping_error(mapping);
    } else if let Some(config) = err.downcast_ref::<ConfigError>() {
        reporter.report_config_error(config);
    } else {
        eprintln!("Error: {:#}", err);
    }
}

async fn load_registry(schema: &Path) -> anyhow::Result<Rc<SchemaRegistry>> {
    let root = SchemaLoader::load(schema)
        .await
        .map_err(MappingError::from)?;
    let registry = SchemaRegistry::build(root).map_err(MappingError::from)?;
    tracing::debug!(
        schema = %schema.display(),
        types = registry.len(),
        "schema loaded"
    );
    Ok(registry)
}

async fn run_map(args: &MapArgs, config: &Config, verbosity: VerbosityLevel) -> anyhow::Result<i32> {
    let registry = load_registry(&args.schema).await?;

    let discovery = FileDiscovery::new()
        .with_extensions(config.files.extensions.clone())
        .with_include_patterns(config.files.include_patterns.clone())?
        .with_exclude_patterns(config.files.exclude_patterns.clone())?
        .with_max_depth(config.files.max_depth);

    let engine = MappingEngine::new(
        registry,
        Rc::new(TracingReporter::new()),
        ConfigManager::engine_config(config),
    );
    let session = engine.map_path(&args.path, &discovery).await?;

    let output = Output::new(config.output.format.into(), verbosity);
    print!("{}", output.format_results(&session.results)?);

    Ok(if session.results.has_errors() { 1 } else { 0 })
}

async fn run_dump(args: &DumpArgs) -> anyhow::Result<i32> {
    let registry = load_registry(&args.schema).await?;
    let document = Document::load(&args.file)
        .await
        .map_err(MappingError::from)?;

    let forest = Mapper::new(registry, Rc::new(TracingReporter::new())).parse(&document)?;
    let Some(root) = forest.root() else {
        anyhow::bail!("{} holds no root instance", args.file.display());
    };
    let xml = to_xml_string(root).map_err(MappingError::from)?;

    write_or_print(args.output.as_deref(), &xml).await?;
    Ok(0)
}

async fn run_infer(args: &InferArgs) -> anyhow::Result<i32> {
    let mut documents = Vec::with_capacity(args.files.len());
    for file in &args.files {
        documents.push(Document::load(file).await.map_err(MappingError::from)?);
    }

    let spec = infer_schema(&documents).map_err(MappingError::from)?;
    let text = match args.effective_format() {
        SchemaFormat::Toml => spec.to_toml_string(),
        SchemaFormat::Json => spec.to_json_string(),
    }
    .map_err(MappingError::from)?;

    write_or_print(args.output.as_deref(), &text).await?;
    Ok(0)
}

async fn write_or_print(path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", text.trim_end());
            Ok(())
        }
    }
}
