use chatbot::{
    ChatSession, DatasetProvider, ModelCache, ModelHandle, ModelSelection,
    huggingface::{Endpoints, HuggingFaceDatasets, HuggingFaceModels},
    load_preview,
};
use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};

use crate::{
    cli::Cli,
    command::{Command, HELP},
};

mod cli;
mod command;

pub async fn run() -> anyhow::Result<()> {
    let args = Cli::parse();

    let defaults = Endpoints::default();
    let endpoints = Endpoints {
        hub: args.hub_url.unwrap_or(defaults.hub),
        inference: args.inference_url.unwrap_or(defaults.inference),
        datasets: args.datasets_url.unwrap_or(defaults.datasets),
    };
    let models = ModelCache::new(HuggingFaceModels::new(
        endpoints.clone(),
        args.hf_api_token.clone(),
    ));
    let datasets = HuggingFaceDatasets::new(endpoints, args.hf_api_token);

    if let Some(dataset) = &args.dataset {
        print_preview(&datasets, dataset).await;
    }

    let mut session = ChatSession::new();
    let mut model = load_model(&models, &ModelSelection::new(args.model)).await;

    println!("Type /help for commands.");
    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline(">>> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        editor.add_history_entry(line.as_str())?;

        match Command::parse(&line) {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Clear => {
                session.clear();
                println!("(chat cleared)");
            }
            Command::Model(id) => {
                // chat stays blocked until a loadable model is picked
                model = load_model(&models, &ModelSelection::new(id)).await;
            }
            Command::Dataset(id) => print_preview(&datasets, id).await,
            Command::Unknown(input) => eprintln!("Unknown command {input}, type /help"),
            Command::Prompt(prompt) => {
                let Some(model) = &model else {
                    eprintln!("No model loaded. Please select a different model with /model <id>.");
                    continue;
                };
                match session.submit(prompt, model.as_ref()).await {
                    Ok(reply) => println!("{}", reply.content()),
                    Err(err) => eprintln!("Error: {err}"),
                }
            }
        }
    }

    Ok(())
}

async fn load_model(models: &ModelCache, selection: &ModelSelection) -> Option<ModelHandle> {
    println!("Loading {selection}...");
    match models.acquire(selection).await {
        Ok(handle) => {
            println!("Model {selection} loaded successfully!");
            Some(handle)
        }
        Err(err) => {
            eprintln!("Failed to load model: {err}. Please try selecting a different model.");
            None
        }
    }
}

async fn print_preview(datasets: &dyn DatasetProvider, dataset: &str) {
    println!("Loading dataset...");
    match load_preview(datasets, dataset).await {
        Ok(preview) => {
            println!(
                "Dataset loaded successfully! (Sample size: {})",
                preview.sample_size
            );
            println!("Preview of dataset:");
            for record in &preview.records {
                println!("{record:#}");
            }
        }
        Err(err) => eprintln!("Error loading dataset: {err}"),
    }
}
