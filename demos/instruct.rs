use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use textgen_client::{
    ApiClient, LanguageModel, LogConfig, Parameters, Prompt, SingleFlightLlm, setup_logging,
};
use tracing::info;

fn main() -> Result<()> {
    // Initialize logging
    setup_logging(LogConfig {
        level: tracing::Level::INFO,
        ..Default::default()
    })?;

    // TEXTGEN_URL / TEXTGEN_HOST / TEXTGEN_PORT pick the backend
    let client = Arc::new(ApiClient::from_env()?);
    info!(url = client.url(), "using backend");

    let parameters = Parameters::builder()
        .temperature(0.7)
        .top_p(0.9)
        .max_new_tokens(256)
        .stopping_string("[INST]")
        .build()?;

    let llm = SingleFlightLlm::with_shared_backend(
        client,
        Prompt::llama_instruct("").with_system_prompt("You are a helpful assistant."),
    )
    .with_parameters(parameters);

    // Warm-up: a few parallel questions, served one at a time
    let questions = ["What is a mutex?", "What is a semaphore?", "What is a monitor?"];
    thread::scope(|scope| {
        for question in questions {
            let llm = llm.clone();
            scope.spawn(move || match llm.call(question, None) {
                Ok(answer) => println!("Q: {}\nA: {}\n", question, answer.trim()),
                Err(e) => eprintln!("{}: {}", question, e),
            });
        }
    });

    info!("Entering interaction loop, type 'exit' to quit");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input == "exit" {
            break;
        }

        let answer = llm.call(input, None)?;
        println!("{}", answer.trim());
    }

    Ok(())
}
