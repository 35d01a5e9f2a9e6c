fn main() -> std::process::ExitCode {
    pbi_org_embed_lib::run()
}
