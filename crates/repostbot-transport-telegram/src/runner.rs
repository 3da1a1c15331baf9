use crate::bot::handlers::{self, Command};
use crate::bot::{AdminCache, TelegramGateway};
use crate::config::{get_admin_cache_max_size, get_admin_cache_ttl, BotSettings};
use repostbot_core::config::{RepostSettings, StorageBackend};
use repostbot_core::service::RepostService;
use repostbot_core::state_store::GroupStateStore;
use repostbot_core::storage::{FileGroupStore, GroupStore, MemoryGroupStore, R2GroupStore};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::Me;
use tracing::{error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let store = init_storage(&settings.repost).await;
    let states = Arc::new(GroupStateStore::new(
        store,
        settings.repost.default_toggles,
    ));

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let gateway = Arc::new(TelegramGateway::new(bot.clone(), init_admin_cache()));
    let service = init_service(gateway, states, &settings.repost);
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![service])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn init_storage(settings: &RepostSettings) -> Arc<dyn GroupStore> {
    let store: Arc<dyn GroupStore> = match settings.storage_backend {
        StorageBackend::File => Arc::new(FileGroupStore::new(&settings.repost_data_path)),
        StorageBackend::Memory => Arc::new(MemoryGroupStore::new()),
        StorageBackend::R2 => match R2GroupStore::new(settings).await {
            Ok(s) => Arc::new(s),
            Err(e) => {
                error!("Failed to initialize R2 storage: {}", e);
                std::process::exit(1);
            }
        },
    };
    match store.check_connection().await {
        Ok(()) => info!(backend = ?settings.storage_backend, "Group storage initialized."),
        Err(e) => error!("Group storage connection check returned error: {}", e),
    }
    store
}

fn init_admin_cache() -> AdminCache {
    let ttl = get_admin_cache_ttl();
    let max_size = get_admin_cache_max_size();
    info!("Initializing AdminCache (ttl: {}s, max_size: {})", ttl, max_size);
    AdminCache::new(ttl, max_size)
}

fn init_service(
    gateway: Arc<TelegramGateway>,
    states: Arc<GroupStateStore>,
    settings: &RepostSettings,
) -> Arc<RepostService> {
    let service = settings
        .load_strings()
        .and_then(|strings| RepostService::new(gateway, states, settings, strings));
    match service {
        Ok(s) => {
            info!(style = %settings.callout_style, "Repost service initialized.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to initialize repost service: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(dptree::endpoint(handle_message)),
        )
        .branch(Update::filter_channel_post().endpoint(handle_message))
}

async fn handle_command(
    service: Arc<RepostService>,
    me: Me,
    msg: Message,
    cmd: Command,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::command(service, me, msg, cmd).await {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_message(
    service: Arc<RepostService>,
    msg: Message,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::message(service, msg).await {
        error!("Message handler error: {}", e);
    }
    respond(())
}
