use error_stack::Report;
use identity_server::{cmd::actual_main, Error};

fn main() -> Result<(), Report<Error>> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Report::new(e).change_context(Error::ServerStart))?
        .block_on(actual_main())
}
