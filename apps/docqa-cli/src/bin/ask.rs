use std::env;

use docqa_core::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <question> [--docs DIR] [--top-k N]", args[0]);
        eprintln!("Example: {} 'how long does stored water keep?' --docs ./documents", args[0]);
        std::process::exit(1);
    }
    let question = &args[1];
    let mut settings = Config::load()?.settings()?;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--docs" if i + 1 < args.len() => {
                settings.documents.dir = args[i + 1].clone();
                i += 1;
            }
            "--top-k" if i + 1 < args.len() => match args[i + 1].parse::<usize>() {
                Ok(k) if k > 0 => {
                    settings.rag.top_k = k;
                    i += 1;
                }
                _ => {
                    eprintln!("Error: --top-k requires a positive number");
                    std::process::exit(1);
                }
            },
            other => {
                eprintln!("Error: unexpected argument '{other}'");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    println!("docqa-ask\n=========");
    println!("Question: {}", question);
    println!("Documents: {}", settings.documents_dir().display());

    let pipelines = docqa_rag::build_from_settings(&settings).await?;
    println!("Indexed {} chunks", pipelines.chunks);

    let (answer, sources) = pipelines.retrieval_qa.answer_with_sources(question).await?;
    println!("\n{}", answer);
    if !sources.is_empty() {
        println!("\nSources:");
        for (n, hit) in sources.iter().enumerate() {
            println!("  {}. score={:.4}  id={}  path={}", n + 1, hit.score, hit.chunk.id, hit.chunk.source);
        }
    }
    Ok(())
}
