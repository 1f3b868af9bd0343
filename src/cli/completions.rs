use crate::cli::args::{Cli, CompletionCommands};
use crate::utils::errors::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

pub fn handle_completion_command(command: &CompletionCommands) -> Result<()> {
    let shell = command.shell();
    let mut cmd = Cli::command();
    let app_name = "certsync";

    generate(shell, &mut cmd, app_name, &mut io::stdout());

    // Domain arguments complete from the hosts already holding a live certificate
    if matches!(shell, Shell::Bash) {
        println!();
        print!(
            r#"
_certsync_live_domains() {{
    local root="${{CERTSYNC_CERT_ROOT:-/etc/letsencrypt/live}}"
    ls -1 "$root" 2>/dev/null | grep -v '^README$'
}}

_certsync_override() {{
    local cur prev words cword
    _init_completion || return

    case "${{words[1]}}" in
        status|push|resolve)
            if [[ "$cur" != -* ]]; then
                COMPREPLY=($(compgen -W "$(_certsync_live_domains)" -- "${{cur}}"))
                return 0
            fi
            ;;
    esac

    _certsync "$@"
}}

complete -F _certsync_override certsync
"#
        );
    }

    Ok(())
}
