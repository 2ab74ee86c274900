use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

use crate::model_gateway::CompletionGateway;
use crate::session::ChatSession;
use crate::transcript::{Entry, TurnStatus};

const LOAD_FILE_PREFIX: &str = "load file:";
const SYSTEM_PROMPT_PREFIX: &str = "system prompt:";
const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command<'a> {
    Exit,
    Skip,
    History,
    LoadFile(&'a str),
    SystemPrompt(&'a str),
    Chat(&'a str),
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Skip;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return Command::Exit;
    }
    if line.eq_ignore_ascii_case("/history") {
        return Command::History;
    }
    if let Some(path) = strip_prefix_ignore_case(line, LOAD_FILE_PREFIX) {
        return Command::LoadFile(path.trim());
    }
    if let Some(prompt) = strip_prefix_ignore_case(line, SYSTEM_PROMPT_PREFIX) {
        return Command::SystemPrompt(prompt.trim());
    }
    Command::Chat(line)
}

pub async fn run_repl<G: CompletionGateway>(session: &mut ChatSession<G>) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run_repl_with(session, stdin.lock(), stdout.lock()).await
}

pub async fn run_repl_with<G, R, W>(
    session: &mut ChatSession<G>,
    mut input: R,
    mut output: W,
) -> Result<()>
where
    G: CompletionGateway,
    R: BufRead,
    W: Write,
{
    writeln!(output, "docchat: Hello! I'm ready to help. You can:")?;
    writeln!(output, "- Chat normally")?;
    writeln!(output, "- Type 'load file: <path>' to load a document")?;
    writeln!(output, "- Type 'system prompt: <new prompt>' to update the system prompt")?;
    writeln!(output, "- Type '/history' to inspect the conversation")?;
    writeln!(output, "- Type 'exit' to end the conversation")?;

    loop {
        write!(output, "\nYou: ")?;
        output.flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("Failed to read stdin")?;
        if read == 0 {
            break;
        }

        match parse_command(&line) {
            Command::Exit => break,
            Command::Skip => continue,
            Command::History => print_history(&mut output, session.transcript())?,
            Command::LoadFile("") => {
                writeln!(output, "docchat: Usage: load file: <path>")?;
            }
            Command::LoadFile(path) => match session.try_load_document(path) {
                Ok(filename) => writeln!(output, "docchat: Successfully loaded {filename}")?,
                Err(err) => writeln!(output, "docchat: Error loading document: {err}")?,
            },
            Command::SystemPrompt(prompt) => {
                session.update_system_prompt(prompt);
                writeln!(
                    output,
                    "docchat: System prompt updated. Conversation history cleared."
                )?;
            }
            Command::Chat(text) => {
                let reply = session.send(text).await;
                writeln!(output, "\ndocchat: {}", reply.trim())?;
            }
        }
    }

    output.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn print_history(output: &mut impl Write, history: &[Entry]) -> io::Result<()> {
    for (idx, entry) in history.iter().enumerate() {
        let marker = match &entry.status {
            TurnStatus::Committed => String::new(),
            TurnStatus::Failed(reason) => format!(" [failed: {reason}]"),
            other => format!(" [{}]", other.as_str()),
        };
        writeln!(
            output,
            "[{}] {}: {}{}",
            idx,
            entry.message.role.as_str(),
            preview(&entry.message.content),
            marker
        )?;
    }
    Ok(())
}

fn preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use std::io::Cursor;

    use super::{Command, parse_command, preview, run_repl_with};
    use crate::model::Message;
    use crate::model_gateway::{CompletionFuture, CompletionGateway, CompletionRequest};
    use crate::session::ChatSession;

    struct EchoGateway;

    impl CompletionGateway for EchoGateway {
        fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
            let result = request
                .messages
                .last()
                .map(|message| format!("echo: {}", message.content))
                .ok_or_else(|| anyhow!("no messages"));
            Box::pin(async move { result })
        }
    }

    async fn drive(script: &str) -> (ChatSession<EchoGateway>, String) {
        let mut session = ChatSession::new(EchoGateway, Some("sys"));
        let mut output = Vec::new();
        run_repl_with(&mut session, Cursor::new(script.to_string()), &mut output)
            .await
            .expect("repl should run");
        (session, String::from_utf8(output).expect("utf8 output"))
    }

    #[test]
    fn parse_command_recognizes_exit_case_insensitively() {
        assert_eq!(parse_command("exit"), Command::Exit);
        assert_eq!(parse_command("  EXIT \n"), Command::Exit);
        assert_eq!(parse_command("Quit"), Command::Exit);
    }

    #[test]
    fn parse_command_reads_prefixed_arguments() {
        assert_eq!(
            parse_command("load file:  ./notes.txt  "),
            Command::LoadFile("./notes.txt")
        );
        assert_eq!(
            parse_command("LOAD FILE:/tmp/a.md"),
            Command::LoadFile("/tmp/a.md")
        );
        assert_eq!(
            parse_command("System Prompt: Be brief."),
            Command::SystemPrompt("Be brief.")
        );
    }

    #[test]
    fn parse_command_treats_other_lines_as_chat() {
        assert_eq!(parse_command("   "), Command::Skip);
        assert_eq!(parse_command("/history"), Command::History);
        assert_eq!(parse_command("load the file please"), Command::Chat("load the file please"));
        assert_eq!(parse_command("exit now"), Command::Chat("exit now"));
        assert_eq!(parse_command("héllo"), Command::Chat("héllo"));
    }

    #[test]
    fn preview_flattens_and_shortens_content() {
        assert_eq!(preview("a\nb"), "a b");
        let long = "x".repeat(100);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(80)));
    }

    #[tokio::test]
    async fn chat_lines_are_sent_until_exit() {
        let (session, output) = drive("hello\nexit\nnever sent\n").await;
        assert!(output.contains("docchat: echo: hello"), "output: {output}");
        assert_eq!(
            session.messages(),
            vec![
                Message::system("sys"),
                Message::user("hello"),
                Message::assistant("echo: hello"),
            ]
        );
    }

    #[tokio::test]
    async fn end_of_input_stops_the_loop() {
        let (session, _) = drive("hello").await;
        assert_eq!(session.messages().len(), 3);
    }

    #[tokio::test]
    async fn system_prompt_command_resets_history() {
        let (session, output) = drive("hello\nsystem prompt: Be brief.\n").await;
        assert!(output.contains("System prompt updated"), "output: {output}");
        assert_eq!(session.messages(), vec![Message::system("Be brief.")]);
    }

    #[tokio::test]
    async fn load_file_failure_is_reported_and_loop_continues() {
        let (session, output) = drive("load file: /no/such/file.txt\nhello\n").await;
        assert!(
            output.contains("Error loading document"),
            "output: {output}"
        );
        assert_eq!(session.messages().len(), 3);
    }

    #[tokio::test]
    async fn load_file_without_path_prints_usage() {
        let (session, output) = drive("load file:\n").await;
        assert!(output.contains("Usage: load file:"), "output: {output}");
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn history_lists_transcript_entries() {
        let (_, output) = drive("hello\n/history\n").await;
        assert!(output.contains("[0] system: sys"), "output: {output}");
        assert!(output.contains("[1] user: hello"), "output: {output}");
        assert!(output.contains("[2] assistant: echo: hello"), "output: {output}");
    }
}
