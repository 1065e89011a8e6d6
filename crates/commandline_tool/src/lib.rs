use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use cobol_ast::{AstFormat, AstTree, CobolAstParser};
use converter::{ConversionRequest, Converter, ConverterConfig};
use dataset_loader::{BatchDriver, DatasetError, load_sources};
use env_checker::{AppConfig, IssueLevel, LoadedConfig, check_all, load_config};
use java_checker::{CompileOutcome, JavaToolchain, extract_key_errors};
use llm_requester::ModelClient;
use process_runner::{ProcessRunner, SystemProcessRunner};
use prompt_builder::{ConversionMode, PromptLoader};

/// File extensions picked up when translating a directory.
const COBOL_EXTENSIONS: &[&str] = &["cbl", "cob"];

#[derive(Parser)]
#[command(name = "cobol2java")]
#[command(version)]
#[command(about = "COBOL to Java translation with a language model", long_about = None)]
pub struct Cli {
    /// Show debug log output (off by default)
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// Explicit config file instead of the config/config.toml search
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate COBOL into Java
    Translate {
        /// COBOL file, directory of .cbl/.cob files, or COBOL source text
        #[arg(long, short, value_name = "FILE|DIR|TEXT", required = true)]
        input: String,

        /// base (source only) or ast (source plus parse tree)
        #[arg(long, short, value_name = "MODE", default_value = "base")]
        mode: ConversionMode,

        /// Where .java files are written (default: [output].dir)
        #[arg(long, short, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// COBOL source format passed to the parser in ast mode
        #[arg(long, value_name = "FORMAT")]
        format: Option<AstFormat>,

        /// Compile each generated file with javac
        #[arg(long)]
        compile: bool,

        /// Compile and run each generated program
        #[arg(long)]
        run: bool,
    },

    /// Print the parse tree of a COBOL file as JSON
    Ast {
        #[arg(long, short, value_name = "FILE", required = true)]
        input: PathBuf,

        #[arg(long, value_name = "FORMAT")]
        format: Option<AstFormat>,
    },

    /// Compile a Java file with javac
    Compile {
        #[arg(long, short, value_name = "FILE", required = true)]
        file: PathBuf,
    },

    /// Run a compiled class, e.g. out_dir/HelloWorld
    Run {
        #[arg(long, short, value_name = "PATH", required = true)]
        binary: PathBuf,
    },

    /// Inspect the COBOL dataset
    Dataset {
        /// Index of the entry to print (default: [dataset].until)
        #[arg(long, short, value_name = "N")]
        until: Option<usize>,

        /// CSV path or URL (default: DATASET_URL / [dataset].location)
        #[arg(long, short, value_name = "LOCATION")]
        location: Option<String>,
    },

    /// Check configuration, JDK, parser and model backend
    Check,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Shared state for one CLI invocation.
pub struct AppContext {
    pub loaded: LoadedConfig,
    pub runner: Arc<dyn ProcessRunner>,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let loaded = load_config(config_path)?;
        match &loaded.source {
            Some(path) => info!("Configuration loaded from {}", path.display()),
            None => info!("Running with default configuration"),
        }
        Ok(Self {
            loaded,
            runner: Arc::new(SystemProcessRunner),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.loaded.config
    }

    fn parser(&self, format: Option<AstFormat>) -> CobolAstParser {
        let mut parser_config = self.config().parser.clone();
        if let Some(format) = format {
            parser_config.format = format;
        }
        CobolAstParser::new(self.runner.clone(), parser_config)
    }

    fn toolchain(&self) -> JavaToolchain {
        JavaToolchain::new(self.runner.clone(), self.config().java.clone())
    }

    async fn converter(&self, output_dir: Option<&Path>) -> Result<Converter> {
        let config = self.config();
        let system_prompt = match &config.prompts.dir {
            Some(dir) => Some(PromptLoader::new(dir)?.load_system_prompt().await?),
            None => None,
        };
        let model = Arc::new(ModelClient::new(config.llm.clone()));
        Ok(Converter::new(
            model,
            self.runner.clone(),
            ConverterConfig {
                output_dir: output_dir
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| config.output.dir.clone()),
                java: config.java.clone(),
                system_prompt,
            },
        ))
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let ctx = AppContext::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Translate {
            input,
            mode,
            output_dir,
            format,
            compile,
            run,
        } => {
            let options = TranslateOptions {
                mode,
                format,
                compile: compile || run,
                run,
            };
            run_translate(&ctx, &input, output_dir.as_deref(), &options).await
        }
        Commands::Ast { input, format } => run_ast(&ctx, &input, format),
        Commands::Compile { file } => run_compile(&ctx, &file),
        Commands::Run { binary } => run_run(&ctx, &binary),
        Commands::Dataset { until, location } => run_dataset(&ctx, until, location).await,
        Commands::Check => run_check(&ctx).await,
    }
}

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub mode: ConversionMode,
    pub format: Option<AstFormat>,
    pub compile: bool,
    pub run: bool,
}

/// Translate a file, a directory of COBOL files, or literal source text.
pub async fn run_translate(
    ctx: &AppContext,
    input: &str,
    output_dir: Option<&Path>,
    options: &TranslateOptions,
) -> Result<()> {
    let converter = ctx.converter(output_dir).await?;
    let input_path = Path::new(input);

    if !input_path.is_dir() {
        return translate_one(ctx, &converter, input, options).await;
    }

    let files = find_cobol_files(input_path);
    if files.is_empty() {
        warn!("No COBOL files found in {}", input_path.display());
        println!("No .cbl/.cob files found in {}", input_path.display());
        return Ok(());
    }
    println!("Found {} COBOL files in {}", files.len(), input_path.display());

    let mut failed = Vec::new();
    for (i, file) in files.iter().enumerate() {
        println!("[{}/{}] {}", i + 1, files.len(), file.display());
        let input = file.to_string_lossy();
        if let Err(e) = translate_one(ctx, &converter, &input, options).await {
            error!("Translation of {} failed: {:#}", file.display(), e);
            eprintln!("  failed: {:#}", e);
            failed.push(file.clone());
        }
    }

    println!(
        "Summary: {} succeeded, {} failed",
        files.len() - failed.len(),
        failed.len()
    );
    for file in &failed {
        println!("  failed: {}", file.display());
    }
    if failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} of {} translations failed", failed.len(), files.len()))
    }
}

async fn translate_one(
    ctx: &AppContext,
    converter: &Converter,
    input: &str,
    options: &TranslateOptions,
) -> Result<()> {
    let request = match options.mode {
        ConversionMode::Base => ConversionRequest::base(input),
        ConversionMode::WithAst => ConversionRequest::with_ast(input, parse_input(ctx, input, options.format)?),
    };

    if options.run {
        let outcome = converter.translate_compile_run(&request).await?;
        println!("Generated {}", outcome.artifact.java_path.display());
        print!("{}", outcome.execution.stdout);
        if !outcome.execution.stderr.is_empty() {
            eprint!("{}", outcome.execution.stderr);
        }
        if !outcome.execution.success() {
            bail!(
                "{} exited with status {}",
                outcome.artifact.class_name,
                outcome.execution.exit_code
            );
        }
        return Ok(());
    }

    let artifact = converter.translate(&request).await?;
    println!("Generated {}", artifact.java_path.display());

    if options.compile {
        match converter.compile(&artifact.java_path)? {
            Some(compiled) => println!("Compiled {}", compiled.binary_path.display()),
            None => bail!("javac rejected {}", artifact.java_path.display()),
        }
    }
    Ok(())
}

fn parse_input(ctx: &AppContext, input: &str, format: Option<AstFormat>) -> Result<AstTree> {
    let parser = ctx.parser(format);
    let format = parser.config().format;
    let path = Path::new(input);
    let ast = if !input.contains('\n') && path.is_file() {
        parser.parse_file_with_format(path, format)?
    } else {
        parser.parse_source(input, format)?
    };
    Ok(ast)
}

/// All `.cbl`/`.cob` files below `dir`, sorted for a stable order.
pub fn find_cobol_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(10)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| COBOL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    debug!("Found {} COBOL files under {}", files.len(), dir.display());
    files
}

pub fn run_ast(ctx: &AppContext, input: &Path, format: Option<AstFormat>) -> Result<()> {
    let parser = ctx.parser(format);
    let ast = parser.parse_file(input)?;
    println!("{}", ast.to_prompt_text());
    Ok(())
}

pub fn run_compile(ctx: &AppContext, file: &Path) -> Result<()> {
    match ctx.toolchain().check_compile(file)? {
        CompileOutcome::Compiled(compiled) => {
            println!("Compiled {}", compiled.binary_path.display());
            Ok(())
        }
        CompileOutcome::Failed {
            exit_code,
            diagnostics,
        } => {
            eprintln!("{}", extract_key_errors(&diagnostics));
            bail!("javac exited with status {} for {}", exit_code, file.display())
        }
    }
}

pub fn run_run(ctx: &AppContext, binary: &Path) -> Result<()> {
    let result = ctx.toolchain().run(binary)?;
    print!("{}", result.stdout);
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }
    if result.success() {
        Ok(())
    } else {
        bail!("{} exited with status {}", binary.display(), result.exit_code)
    }
}

pub async fn run_dataset(
    ctx: &AppContext,
    until: Option<usize>,
    location: Option<String>,
) -> Result<()> {
    let dataset = &ctx.config().dataset;
    let location = location
        .or_else(|| dataset.location.clone())
        .ok_or(DatasetError::NoLocation)?;

    let sources = load_sources(&location, &dataset.column)
        .await
        .with_context(|| format!("failed to load dataset from {}", location))?;
    info!("Loaded {} COBOL snippets", sources.len());

    let mut driver = BatchDriver::new(until.unwrap_or(dataset.until));
    if let Some(output) = &dataset.test_case_output {
        driver = driver.with_output(output);
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = driver.run(&sources, &mut out)?;
    out.flush()?;

    if report.inspected.is_none() {
        eprintln!(
            "Dataset has {} entries, nothing at index {}",
            sources.len(),
            driver.until()
        );
    }
    if let Some(path) = report.written_to {
        eprintln!("Test cases written to {}", path.display());
    }
    Ok(())
}

pub async fn run_check(ctx: &AppContext) -> Result<()> {
    let summary = check_all(&ctx.loaded, ctx.runner.clone()).await;

    match &summary.config.path {
        Some(path) => println!("Configuration: {}", path.display()),
        None => println!("Configuration: defaults (no config.toml found)"),
    }
    if summary.config.issues.is_empty() {
        println!("  no issues");
    }
    for issue in &summary.config.issues {
        match issue.level {
            IssueLevel::Error => error!("{}", issue),
            IssueLevel::Warning => warn!("{}", issue),
        }
        println!("  {}", issue);
    }

    println!("Environment:");
    for item in &summary.environment.items {
        println!("  {}", item);
    }

    if summary.has_errors() {
        bail!("environment check failed");
    }
    println!("All checks passed");
    Ok(())
}
