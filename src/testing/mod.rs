//! Testing infrastructure: scripted RPC network and explorer page stubs used by the
//! unit tests and the scenario tests under `tests/`.

pub mod mock_rpc;

pub use mock_rpc::{abi_string, abi_uint, MockPageFetcher, MockRpcNetwork, RecordedCall};
