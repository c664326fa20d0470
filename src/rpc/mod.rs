pub mod abi;
pub mod reader;
pub mod session;
pub mod transport;

pub use reader::{ContractReader, ViewCall};
pub use session::{Connection, Endpoint, RpcSession};
pub use transport::{HttpTransport, RpcTransport};
