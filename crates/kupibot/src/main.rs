use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, Polling};
use tokio::net::TcpListener;
use url::Url;

use kupicore::analytics::BackendClient;
use kupicore::logging::init_logger;
use kupicore::{Config, UserRegistry};
use kupidon::cli::{Cli, Commands};
use kupidon::server::create_api_router;
use kupidon::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to the run loop.
///
/// # Errors
/// Returns an error if initialization fails (logging, bot creation, port
/// binding).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Catch panics from handler tasks so a single bad update cannot take
    // the process down silently.
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    let config = Arc::new(Config::from_env());
    init_logger(&config.log_file_path)?;

    match cli.command {
        Some(Commands::Run { polling }) => run_bot(config, polling).await,
        None => run_bot(config, false).await,
    }
}

async fn run_bot(config: Arc<Config>, force_polling: bool) -> Result<()> {
    log::info!("Starting bot...");

    if config.bot_token.is_empty() {
        anyhow::bail!("BOT_TOKEN не задан. Укажите BOT_TOKEN в .env");
    }

    let bot = create_bot(&config)?;

    let me = bot.get_me().await?;
    log::info!("Bot username: {:?}, Bot ID: {}", me.username, me.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::error!("Не удалось установить команды бота: {}", e);
    } else {
        log::info!("Команды бота установлены");
    }

    let backend = Arc::new(BackendClient::from_config(&config));
    if backend.is_enabled() {
        log::info!(
            "Analytics collector enabled ({})",
            config.api_base_url.as_deref().unwrap_or("<unknown>")
        );
    } else {
        log::info!("Analytics collector disabled (API_BASE_URL or BOT_BACKEND_SECRET unset)");
    }

    let registry = Arc::new(UserRegistry::new(config.user_ids_file.clone()));
    log::info!("User registry file: {}", registry.path().display());

    let deps = HandlerDeps::new(Arc::clone(&config), backend, Arc::clone(&registry));
    let handler = schema(deps);
    let api_router = create_api_router(bot.clone(), Arc::clone(&config), registry);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let webhook_endpoint = if force_polling { None } else { config.webhook_endpoint() };

    match webhook_endpoint {
        Some(endpoint) => {
            let url: Url = endpoint.parse()?;

            let mut options = webhooks::Options::new(addr, url.clone());
            match &config.webhook_secret {
                Some(secret) => options = options.secret_token(secret.clone()),
                None => log::warn!("TELEGRAM_WEBHOOK_SECRET не задан, проверка заголовка вебхука пропущена"),
            }

            let (listener, stop_flag, webhook_router) = webhooks::axum_no_setup(options);

            if config.auto_set_webhook {
                ensure_webhook(&bot, &config, &url).await;
            } else {
                log::info!("AUTO_SET_WEBHOOK=false — пропускаю установку вебхука");
                log_manual_webhook_hint(&config);
            }

            let app = api_router.merge(webhook_router);
            let tcp = TcpListener::bind(&addr).await?;
            log::info!("HTTP сервер запущен на порту {}", config.port);
            let server = tokio::spawn(async move {
                if let Err(e) = axum::serve(tcp, app).with_graceful_shutdown(stop_flag).await {
                    log::error!("HTTP server error: {}", e);
                }
            });

            log::info!("Starting bot in webhook mode at {}", endpoint);
            Dispatcher::builder(bot, handler)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;

            // Dispatcher shutdown stops the listener, which resolves the
            // server's graceful-shutdown future.
            let _ = server.await;
            log::info!("Сервер закрыт. Выход.");
        }
        None => {
            let tcp = TcpListener::bind(&addr).await?;
            log::info!("HTTP сервер запущен на порту {}", config.port);
            tokio::spawn(async move {
                if let Err(e) = axum::serve(tcp, api_router).await {
                    log::error!("HTTP server error: {}", e);
                }
            });

            log::info!("Starting bot in long polling mode");
            let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
            Dispatcher::builder(bot, handler)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
    }

    Ok(())
}

/// Registers the webhook with Telegram on startup.
async fn ensure_webhook(bot: &Bot, config: &Config, url: &Url) {
    use teloxide::types::AllowedUpdate;

    let Some(secret) = config.webhook_secret.clone() else {
        log::warn!("Для автоматической установки вебхука нужен TELEGRAM_WEBHOOK_SECRET.");
        log_manual_webhook_hint(config);
        return;
    };

    let request = bot
        .set_webhook(url.clone())
        .secret_token(secret)
        .drop_pending_updates(true)
        .allowed_updates(vec![
            AllowedUpdate::Message,
            AllowedUpdate::CallbackQuery,
            AllowedUpdate::ChatMember,
            AllowedUpdate::ChatJoinRequest,
            AllowedUpdate::PreCheckoutQuery,
        ]);

    match request.await {
        Ok(_) => log::info!("Webhook установлен: {}", url),
        Err(e) => log::error!("Не удалось установить вебхук: {}", e),
    }
}

/// Logs a curl one-liner for setting the webhook by hand.
fn log_manual_webhook_hint(config: &Config) {
    let full_url = config
        .webhook_endpoint()
        .unwrap_or_else(|| format!("https://your-domain.com{}", config.webhook_path));
    log::warn!("Вебхук можно установить вручную через curl:");
    log::warn!(
        "curl -sS -X POST https://api.telegram.org/bot<YOUR_BOT_TOKEN>/setWebhook \
         -H \"Content-Type: application/json\" \
         -d '{{\"url\":\"{}\",\"secret_token\":\"{}\",\"drop_pending_updates\":true,\
         \"allowed_updates\":[\"message\",\"callback_query\",\"chat_member\",\"chat_join_request\",\"pre_checkout_query\"]}}'",
        full_url,
        config.webhook_secret.as_deref().unwrap_or("your-strong-secret")
    );
}
