use anyhow::{bail, Result};
use serde_json::{json, Map};
use textgen_client::{ApiClient, LogConfig, ModelInfo, setup_logging};

fn print_info(info: &ModelInfo) {
    match info {
        ModelInfo::Loaded { model_name, lora_names, shared } => {
            println!("loaded: {}", model_name);
            if !lora_names.is_empty() {
                println!("loras:  {}", lora_names.join(", "));
            }
            if let Some(loader) = shared.args.get("loader") {
                println!("loader: {}", loader);
            }
        }
        ModelInfo::NotLoaded { .. } => println!("no model loaded"),
    }
}

/// Usage: model_admin [list | load <model> [loader]]
fn main() -> Result<()> {
    setup_logging(LogConfig::default())?;

    let client = ApiClient::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] => print_info(&client.model_info()?),
        ["list"] => {
            for name in client.list_models()? {
                println!("{}", name);
            }
        }
        ["load", model, rest @ ..] => {
            let mut loader_args = Map::new();
            if let Some(loader) = rest.first() {
                loader_args.insert("loader".to_string(), json!(loader));
            }
            print_info(&client.load_model(model, loader_args)?);
        }
        other => bail!("unrecognised arguments: {:?}", other),
    }

    Ok(())
}
