use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use log::{error, info};
use rigview_server::{
    config::Args,
    pipeline::{chain::CommandChain, watch::SourceWatcher, AssetPipeline, SourceChange},
    server::{websocket::WebSocketServer, Server},
};
use tokio::sync::mpsc;
use tokio_serde::formats::Json;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let config = match args.load_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let websocket_server = match WebSocketServer::bind(config.listen).await {
        Ok(websocket_server) => websocket_server,
        Err(err) => {
            error!("Failed to listen on {}: {}", config.listen, err);
            return ExitCode::FAILURE;
        }
    };

    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let _watcher = match SourceWatcher::new(&config.source, config.debounce(), changes_tx.clone())
    {
        Ok(watcher) => watcher,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    if config.convert_on_start {
        // The receiver is still held below.
        let _ = changes_tx.send(SourceChange::Startup);
    }
    drop(changes_tx);

    let server = Arc::new(Server::new());
    let pipeline = Arc::new(AssetPipeline::new(
        CommandChain::from_config(&config),
        server.clone(),
    ));

    let serve = tokio::spawn(websocket_server.serve(server, Json::default));
    let run = tokio::spawn(pipeline.run(changes_rx));

    tokio::select! {
        serve_result = serve => {
            match serve_result {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(err)) => {
                    error!("Failed to serve: {}", err);
                    ExitCode::FAILURE
                }
                Err(err) => {
                    error!("Serve crashed: {}", err);
                    ExitCode::FAILURE
                }
            }
        }
        run_result = run => {
            if let Err(err) = run_result {
                error!("Pipeline crashed: {}", err);
                return ExitCode::FAILURE;
            }
            info!("Pipeline stopped");
            ExitCode::SUCCESS
        }
    }
}
