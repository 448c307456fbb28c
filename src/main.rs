use std::sync::Arc;

use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use live_rocket::{App, Config, Route, Server, StatusCode, Templates, from_fn};

fn build_app(cfg: &Config) -> anyhow::Result<App> {
    let templates = Arc::new(Templates::new(&cfg.templates_dir));

    let app = App::builder()
        .middleware(from_fn(|req, res, next| {
            next.run(req, res)?;
            res.set_header("Server", "live_rocket");
            Ok(())
        }))
        .get("/", |_req, res| {
            res.send("live_rocket is running\n");
            Ok(())
        })
        .route(
            Route::get("/users/<int:id>", |req, res| {
                let id = req.params.get_int("id").unwrap_or_default();
                res.json(&json!({ "id": id }))?;
                Ok(())
            })
            .name("user"),
        )
        .get("/users/me", |_req, res| {
            res.redirect_to_route("user", [("id", 1)], false);
            Ok(())
        })
        .get("/files/<path:rest>", |req, res| {
            let rest = req.params.get_str("rest").unwrap_or_default();
            res.send(format!("file: {}\n", rest));
            Ok(())
        })
        .get("/hello/<name>", move |req, res| {
            let name = req.params.get_str("name").unwrap_or("world");
            res.render(templates.as_ref(), "hello.html", &json!({ "name": name }))?;
            Ok(())
        })
        .post("/echo", |req, res| {
            res.set_status(StatusCode::Ok)
                .set_header("Content-Type", req.header("Content-Type").unwrap_or("application/octet-stream"))
                .set_body(req.body.clone());
            Ok(())
        })
        .get("/old", |_req, res| {
            res.redirect("/", true);
            Ok(())
        })
        .build()?;

    Ok(app)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    let app = build_app(&cfg)?;
    let server = Server::bind(&cfg, app).await?;

    server
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
        })
        .await
}
