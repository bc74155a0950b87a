use crate::cli::PromptArgs;
use crate::config::Config;
use crate::runner::build_prompt;

pub fn execute(args: PromptArgs) -> anyhow::Result<()> {
    let config = Config::discover(args.question.config.as_deref())?;
    config.validate()?;

    let request = args.question.to_request(&config.generation);
    let prompt = build_prompt(&request, &config.generation)?;

    println!("{}", prompt.text);
    Ok(())
}
