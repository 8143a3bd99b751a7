use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use anyhow::{bail, Context};
use cairn_client::{CairnClient, UploadOutcome};
use cairn_crypto::BlobHasher;
use cairn_server::{CairnServer, ServerConfig, StorageConfig};
use cairn_store::{BlobStore, FilesystemBlobStore};
use cairn_types::{BlobRef, SizedBlobRef};
use colored::Colorize;

use crate::cli::*;

const READ_CHUNK: usize = 64 * 1024;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Ref(args) => cmd_ref(args),
        Command::Put(args) => cmd_put(args, format),
        Command::Get(args) => cmd_get(args),
        Command::Check(args) => cmd_check(args, format),
        Command::List(args) => cmd_list(args, format),
        Command::Upload(args) => cmd_upload(args, format),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = serve_config(&args)?;
    if let StorageConfig::Filesystem { root } = &config.storage {
        std::fs::create_dir_all(root)
            .with_context(|| format!("creating storage root {}", root.display()))?;
    }
    let server = CairnServer::new(config)?;
    println!(
        "{} cairn on {}",
        "▶".green().bold(),
        server.config().bind_addr.to_string().bold()
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}

/// Config file (or defaults), then `CAIRN_PASSWORD`, then command-line flags.
fn serve_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    }
    .with_env_overrides();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.memory {
        config.storage = StorageConfig::Memory;
    } else if let Some(root) = &args.root {
        config.storage = StorageConfig::Filesystem { root: root.clone() };
    }
    Ok(config)
}

fn cmd_ref(args: RefArgs) -> anyhow::Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("opening {}", args.file.display()))?;
    let blob_ref = hash_reader(file, args.algorithm.into())?;
    println!("{blob_ref}");
    Ok(())
}

fn hash_reader(reader: impl Read, algorithm: cairn_types::HashAlgorithm) -> io::Result<BlobRef> {
    let mut reader = BufReader::new(reader);
    let mut hasher = BlobHasher::new(algorithm);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

fn cmd_put(args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = FilesystemBlobStore::create(&args.root)?;
    let data = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let blob_ref = BlobHasher::digest(args.algorithm.into(), &data);
    let sized = store.put(&blob_ref, data.into())?;
    tracing::debug!(path = %store.blob_path(&sized.blob_ref).display(), "stored");
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&sized)?),
        OutputFormat::Text => println!(
            "{} {} ({} bytes)",
            "✓".green().bold(),
            sized.blob_ref.to_string().yellow(),
            sized.size
        ),
    }
    Ok(())
}

fn cmd_get(args: GetArgs) -> anyhow::Result<()> {
    let store = open_store(&args.root)?;
    let blob_ref = parse_ref(&args.blob_ref)?;
    let data = store.get(&blob_ref)?;
    match &args.output {
        Some(path) => std::fs::write(path, &data)
            .with_context(|| format!("writing {}", path.display()))?,
        None => {
            let mut out = io::stdout().lock();
            out.write_all(&data)?;
            out.flush()?;
        }
    }
    Ok(())
}

fn cmd_check(args: CheckArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.root)?;
    let blob_ref = parse_ref(&args.blob_ref)?;
    let found = store.check(&blob_ref)?;
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string(&found)?);
    } else if let Some(sized) = &found {
        println!("{} {} ({} bytes)", "present".green(), sized.blob_ref, sized.size);
    } else {
        println!("{} {}", "missing".red(), blob_ref);
    }
    if found.is_none() {
        bail!("{blob_ref} is not stored");
    }
    Ok(())
}

fn cmd_list(args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.root)?;
    let after = args.after.as_deref().map(parse_ref).transpose()?;
    let limit = args.limit.max(1);
    let page = store.list(after.as_ref(), limit)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&page)?),
        OutputFormat::Text => print_page(&page, limit),
    }
    Ok(())
}

fn cmd_upload(args: UploadArgs, format: OutputFormat) -> anyhow::Result<()> {
    let client = CairnClient::new(args.server.as_str())?.with_password(args.password.clone());
    let runtime = tokio::runtime::Runtime::new()?;
    let outcomes = runtime.block_on(upload_files(&client, &args))?;
    if let OutputFormat::Json = format {
        let sized: Vec<&SizedBlobRef> = outcomes.iter().map(UploadOutcome::sized).collect();
        println!("{}", serde_json::to_string(&sized)?);
        return Ok(());
    }
    for (path, outcome) in args.files.iter().zip(&outcomes) {
        let (mark, verb) = match outcome {
            UploadOutcome::Uploaded(_) => ("✓".green().bold(), "uploaded"),
            UploadOutcome::AlreadyHad(_) => ("=".dimmed(), "already had"),
        };
        println!(
            "{mark} {} {verb} {} ({} bytes)",
            path.display(),
            outcome.sized().blob_ref.to_string().yellow(),
            outcome.sized().size
        );
    }
    Ok(())
}

async fn upload_files(client: &CairnClient, args: &UploadArgs) -> anyhow::Result<Vec<UploadOutcome>> {
    let mut outcomes = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let outcome = client
            .upload_file(path, args.algorithm.into())
            .await
            .with_context(|| format!("uploading {} to {}", path.display(), client.server()))?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn print_page(page: &[SizedBlobRef], limit: usize) {
    if page.is_empty() {
        println!("No blobs.");
        return;
    }
    for sized in page {
        println!("{}  {}", sized.blob_ref.to_string().yellow(), sized.size);
    }
    if page.len() == limit {
        if let Some(last) = page.last() {
            println!("{} --after {}", "more:".dimmed(), last.blob_ref);
        }
    }
}

fn open_store(root: &Path) -> anyhow::Result<FilesystemBlobStore> {
    FilesystemBlobStore::open(root)
        .with_context(|| format!("opening blob root {}", root.display()))
}

fn parse_ref(s: &str) -> anyhow::Result<BlobRef> {
    BlobRef::parse(s).with_context(|| format!("invalid blob ref {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_types::HashAlgorithm;
    use clap::Parser;
    use tempfile::TempDir;

    const HELLO_REF: &str = "sha1-aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    #[test]
    fn hash_reader_streams_in_chunks() {
        let data = vec![3u8; READ_CHUNK * 2 + 17];
        let streamed = hash_reader(&data[..], HashAlgorithm::Sha256).unwrap();
        assert_eq!(streamed, BlobHasher::digest(HashAlgorithm::Sha256, &data));

        let hello = hash_reader(&b"hello"[..], HashAlgorithm::Sha1).unwrap();
        assert_eq!(hello.to_string(), HELLO_REF);
    }

    #[test]
    fn put_then_get_through_commands() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("blobs");
        let input = dir.path().join("hello.txt");
        let output = dir.path().join("out.txt");
        std::fs::write(&input, "hello").unwrap();

        cmd_put(
            PutArgs { file: input, root: root.clone(), algorithm: AlgorithmArg::Sha1 },
            OutputFormat::Text,
        )
        .unwrap();
        cmd_get(GetArgs {
            blob_ref: HELLO_REF.into(),
            root: root.clone(),
            output: Some(output.clone()),
        })
        .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"hello");

        cmd_check(CheckArgs { blob_ref: HELLO_REF.into(), root: root.clone() }, OutputFormat::Text)
            .unwrap();
        cmd_list(ListArgs { root, after: None, limit: 10 }, OutputFormat::Json).unwrap();
    }

    #[test]
    fn check_missing_blob_fails() {
        let dir = TempDir::new().unwrap();
        let args = CheckArgs { blob_ref: HELLO_REF.into(), root: dir.path().to_path_buf() };
        assert!(cmd_check(args, OutputFormat::Text).is_err());
    }

    #[test]
    fn get_rejects_bad_ref_and_missing_root() {
        let dir = TempDir::new().unwrap();
        let bad = GetArgs { blob_ref: "nope".into(), root: dir.path().to_path_buf(), output: None };
        assert!(cmd_get(bad).is_err());

        let missing = ListArgs { root: dir.path().join("absent"), after: None, limit: 10 };
        assert!(cmd_list(missing, OutputFormat::Text).is_err());
    }

    fn spawn_memory_server(
        runtime: &tokio::runtime::Runtime,
        config: ServerConfig,
    ) -> (std::sync::Arc<cairn_store::InMemoryBlobStore>, String) {
        let store = std::sync::Arc::new(cairn_store::InMemoryBlobStore::new());
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let server = CairnServer::with_store(store.clone(), config);
        runtime.spawn(server.serve_on(listener, std::future::pending()));
        (store, format!("http://{addr}"))
    }

    #[test]
    fn upload_sends_only_missing_blobs() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (store, server) = spawn_memory_server(&runtime, ServerConfig::default());
        let dir = TempDir::new().unwrap();
        let hello = dir.path().join("hello.txt");
        let big = dir.path().join("big.bin");
        std::fs::write(&hello, "hello").unwrap();
        std::fs::write(&big, vec![9u8; READ_CHUNK * 4]).unwrap();

        let args = |files: Vec<std::path::PathBuf>| UploadArgs {
            files,
            server: server.clone(),
            password: None,
            algorithm: AlgorithmArg::Sha1,
        };
        cmd_upload(args(vec![hello.clone()]), OutputFormat::Text).unwrap();
        assert_eq!(store.len(), 1);

        let client = CairnClient::new(server.as_str()).unwrap();
        let outcomes = runtime
            .block_on(upload_files(&client, &args(vec![hello, big])))
            .unwrap();
        assert!(matches!(outcomes[0], UploadOutcome::AlreadyHad(_)));
        assert!(matches!(outcomes[1], UploadOutcome::Uploaded(_)));
        assert_eq!(outcomes[0].sized().blob_ref.to_string(), HELLO_REF);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn upload_uses_password() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let config = ServerConfig { password: Some("pw".into()), ..ServerConfig::default() };
        let (store, server) = spawn_memory_server(&runtime, config);
        let dir = TempDir::new().unwrap();
        let hello = dir.path().join("hello.txt");
        std::fs::write(&hello, "hello").unwrap();

        let mut args = UploadArgs {
            files: vec![hello],
            server,
            password: None,
            algorithm: AlgorithmArg::Blake3,
        };
        assert!(cmd_upload(args.clone(), OutputFormat::Text).is_err());
        assert!(store.is_empty());

        args.password = Some("pw".into());
        cmd_upload(args, OutputFormat::Json).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn upload_rejects_bad_server_url() {
        let args = UploadArgs {
            files: vec!["a.txt".into()],
            server: "localhost:3179".into(),
            password: None,
            algorithm: AlgorithmArg::Sha1,
        };
        assert!(cmd_upload(args, OutputFormat::Text).is_err());
    }

    #[test]
    fn serve_flags_override_config() {
        let cli = Cli::try_parse_from(["cairn", "serve", "--memory", "--bind", "127.0.0.1:9000"])
            .unwrap();
        let Command::Serve(args) = cli.command else { panic!("wrong command") };
        let config = serve_config(&args).unwrap();
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn serve_reads_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cairn.toml");
        std::fs::write(&path, "stealth = false\nlist_limit = 50\n").unwrap();
        let cli = Cli::try_parse_from([
            "cairn", "serve", "--config", path.to_str().unwrap(), "--root", "/srv/b",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else { panic!("wrong command") };
        let config = serve_config(&args).unwrap();
        assert!(!config.stealth);
        assert_eq!(config.list_limit, 50);
        assert_eq!(
            config.storage,
            StorageConfig::Filesystem { root: "/srv/b".into() }
        );
    }
}
