use alloy::primitives::{address, Address};
use alloy::sol;

sol! {
    /// The deployed playlist portal contract.
    #[sol(rpc)]
    interface SongLinkPortal {
        #[derive(Debug, PartialEq, Eq)]
        struct Wave {
            address sender;
            string playlist_url;
            uint256 timestamp;
        }

        #[derive(Debug, PartialEq, Eq)]
        event NewPlaylist(address indexed from, uint256 timestamp, string playlist_url);

        function upload(string playlist_url) external;
        function getAllWaves() external view returns (Wave[] memory);
        function getTotalPlaylist() external view returns (uint256);
    }
}

/// Address of the deployed portal contract.
pub const DEFAULT_ADDRESS: Address = address!("1794E98C743be19d4a8928BD25340E90C49c1645");

/// Gas ceiling attached to every submission.
pub const GAS_LIMIT: u64 = 300_000;
