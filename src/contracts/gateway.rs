//! WETH gateway, router and recipient callback ABI bindings

use alloy_sol_types::sol;

sol! {
    /// Emitted by the L1 gateway when a deposit is initiated.
    #[derive(Debug, PartialEq, Eq)]
    event DepositERC20(
        address indexed l1Token,
        address indexed l2Token,
        address indexed from,
        address to,
        uint256 amount,
        bytes data
    );

    /// Emitted by the L2 gateway when a deposit is finalized.
    #[derive(Debug, PartialEq, Eq)]
    event FinalizeDepositERC20(
        address indexed l1Token,
        address indexed l2Token,
        address indexed from,
        address to,
        uint256 amount,
        bytes data
    );

    /// Emitted by the L2 gateway when a withdrawal is initiated.
    #[derive(Debug, PartialEq, Eq)]
    event WithdrawERC20(
        address indexed l1Token,
        address indexed l2Token,
        address indexed from,
        address to,
        uint256 amount,
        bytes data
    );

    /// Emitted by the L1 gateway when a withdrawal is finalized.
    #[derive(Debug, PartialEq, Eq)]
    event FinalizeWithdrawERC20(
        address indexed l1Token,
        address indexed l2Token,
        address indexed from,
        address to,
        uint256 amount,
        bytes data
    );

    /// Emitted by a router when the gateway for a token changes.
    #[derive(Debug, PartialEq, Eq)]
    event SetERC20Gateway(
        address indexed token,
        address indexed oldGateway,
        address indexed newGateway
    );

    #[derive(Debug, PartialEq, Eq)]
    function finalizeDepositERC20(
        address l1Token,
        address l2Token,
        address from,
        address to,
        uint256 amount,
        bytes data
    ) external payable;

    #[derive(Debug, PartialEq, Eq)]
    function finalizeWithdrawERC20(
        address l1Token,
        address l2Token,
        address from,
        address to,
        uint256 amount,
        bytes data
    ) external payable;

    /// Hook invoked on the recipient after funds are released.
    #[derive(Debug, PartialEq, Eq)]
    function onScrollGatewayCallback(bytes data) external;
}
