use std::process::ExitCode;

fn main() -> ExitCode {
    match gantry_core::run(std::env::args_os().collect()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("gantry: {err:#}");
            ExitCode::FAILURE
        }
    }
}
