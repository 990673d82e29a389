/// One line typed into the repl.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Prompt(&'a str),
    Clear,
    Model(&'a str),
    Dataset(&'a str),
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Command::Prompt(line);
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match (name, arg) {
            ("clear", "") => Command::Clear,
            ("help", "") => Command::Help,
            ("quit" | "exit", "") => Command::Quit,
            ("model", model) if !model.is_empty() => Command::Model(model),
            ("dataset", dataset) if !dataset.is_empty() => Command::Dataset(dataset),
            _ => Command::Unknown(line),
        }
    }
}

pub const HELP: &str = "\
/model <id>      switch to another model (distilgpt2, gpt2, EleutherAI/gpt-neo-125M)
/dataset <id>    preview a Hugging Face dataset or a json url
/clear           clear the chat
/quit            leave
anything else is sent to the model";
