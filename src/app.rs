use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::cli::OpenArgs;
use crate::config;
use crate::data::Services;
use crate::logging;
use crate::store::Store;
use crate::ui;

pub fn run(args: OpenArgs) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: args.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    if let Err(err) = logging::init(&cfg.log) {
        eprintln!("warning: logging disabled: {err:#}");
    }
    tracing::info!(version = crate::VERSION, post_id = args.post_id, "starting");

    let services = if args.offline {
        tracing::info!("using offline sample data");
        Services::offline()
    } else {
        let user_agent = if cfg.api.user_agent.trim().is_empty() {
            format!("coachfeed/{}", crate::VERSION)
        } else {
            cfg.api.user_agent.clone()
        };
        let client = api::Client::new(api::ClientConfig {
            base_url: Some(cfg.api.base_url.clone()),
            user_agent,
            token: Some(cfg.api.token.clone()),
            timeout: Some(cfg.api.timeout),
            http_client: None,
        })
        .context("create api client")?;
        tracing::info!(base_url = %client.base_url(), "using api backend");
        Services::api(Arc::new(client))
    };

    let mut store = Store::new(services);
    store.fetch_user();

    let mut model = ui::Model::new(ui::Options {
        post_id: args.post_id,
        store,
        tick_rate: cfg.ui.tick_rate,
        web_base_url: cfg.web.base_url.clone(),
        open_browser: cfg.web.open_browser,
    });
    let result = model.run();
    tracing::info!("exiting");
    result
}
