//! Manual broadcast utility: sends a message to every recorded user.
//!
//! Usage: broadcast "Привет! У нас новая функция!"
//! Pass --dry-run to only list the recipients.

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::time::Duration;

use kupicore::logging::init_logger;
use kupicore::{Config, UserRegistry};
use kupidon::telegram::{create_bot, send_to_all};

#[derive(Parser)]
#[command(name = "broadcast")]
#[command(author, version, about = "Рассылка сообщения всем пользователям из файла user_ids.txt", long_about = None)]
struct Cli {
    /// Текст сообщения
    message: String,

    /// Показать список получателей, ничего не отправляя
    #[arg(long)]
    dry_run: bool,

    /// Пауза между отправками, мс
    #[arg(long, default_value_t = 50)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = dotenv();
    let config = Config::from_env();
    init_logger(&config.log_file_path)?;

    let registry = UserRegistry::new(config.user_ids_file.clone());
    let ids = registry.load()?;

    println!("Found {} users:", ids.len());
    for (index, id) in ids.iter().enumerate() {
        println!("{}. {}", index + 1, id);
    }
    println!();
    println!("Message to send: \"{}\"", cli.message);

    if cli.dry_run {
        println!();
        println!("Dry run — ничего не отправлено.");
        return Ok(());
    }
    if ids.is_empty() {
        println!();
        println!("Некому отправлять.");
        return Ok(());
    }
    if config.bot_token.is_empty() {
        anyhow::bail!("BOT_TOKEN не задан. Укажите BOT_TOKEN в .env");
    }

    let bot = create_bot(&config)?;
    let (sent, failed) = send_to_all(&bot, &ids, &cli.message, Duration::from_millis(cli.delay_ms)).await;

    println!();
    println!("Готово: доставлено {}, не доставлено {}.", sent, failed);

    Ok(())
}
