// src/registry/catalog.rs

use super::{MatchRule::*, ToolDescriptor};
use crate::blockchain::models::IntentKind::*;

const GRANITE_ACTIONS: &[&str] = &[
    "granite_prepareBorrow",
    "granite_prepareRepay",
    "granite_prepareAddCollateral",
    "granite_prepareRemoveCollateral",
    "granite_prepareDeposit",
    "granite_prepareWithdraw",
];

const ZEST_ACTIONS: &[&str] = &[
    "zest_prepareSupply",
    "zest_prepareWithdraw",
    "zest_prepareBorrow",
    "zest_prepareRepay",
    "zest_prepareClaimRewards",
];

const ARKADIKO_ACTIONS: &[&str] = &[
    "arkadiko_prepareOpenVault",
    "arkadiko_prepareDeposit",
    "arkadiko_prepareMint",
    "arkadiko_prepareBurn",
    "arkadiko_prepareCloseVault",
    "arkadiko_prepareStakeDiko",
];

const STACKINGDAO_ACTIONS: &[&str] = &[
    "stackingdao_prepareDeposit",
    "stackingdao_prepareInitWithdraw",
    "stackingdao_prepareWithdraw",
];

const POX_ACTIONS: &[&str] = &[
    "pox_prepareStackStx",
    "pox_prepareStackExtend",
    "pox_prepareStackIncrease",
    "pox_prepareDelegateStx",
    "pox_prepareRevokeDelegate",
];

const ALEX_LIQUIDITY_ACTIONS: &[&str] = &["alexAddLiquidity", "alexRemoveLiquidity"];

const SWAP_ACTIONS: &[&str] = &[
    "alexSwap",
    "bitflow_prepareSwap",
    "charisma_prepareSwap",
];

const STX_TRANSFERS: &[&str] = &["stxTransfer", "transferStx", "sendStx"];

const TOKEN_TRANSFERS: &[&str] = &["transferToken", "sip10Transfer", "sbtc_prepareTransfer"];

const LENDING_MARKETS: &[&str] = &[
    "zest_getMarkets",
    "zest_getReserveData",
    "zest_getInterestRates",
    "granite_getMarket",
    "granite_getLpApy",
];

const LENDING_POSITIONS: &[&str] = &[
    "zest_getUserPosition",
    "zest_getHealthFactor",
    "granite_getPosition",
    "granite_getLiquidations",
    "arkadiko_getVault",
    "arkadiko_getVaults",
];

const POOL_TABLES: &[&str] = &[
    "charisma_getPools",
    "arkadiko_getSwapPools",
    "stackingdao_getPools",
];

const NFT_GALLERY: &[&str] = &[
    "getNftHoldings",
    "getNftMints",
    "getNftCollection",
    "bns_getNamesForAddress",
];

const PRICE_TICKERS: &[&str] = &[
    "getStxPrice",
    "alexGetTokenPrices",
    "arkadiko_getUsdaPrice",
    "arkadiko_getDikoPrice",
    "charisma_getTokenPrice",
    "pyth_getPrice",
    "pyth_getPriceFeeds",
];

const PROTOCOL_STATS: &[&str] = &[
    "alexGetTvl",
    "stackingdao_getProtocolStats",
    "hermetica_getUsdhStats",
    "arkadiko_getProtocolStats",
    "sbtc_getPegInfo",
];

const YIELD_RATES: &[&str] = &[
    "stackingdao_getApy",
    "stackingdao_getStStxRatio",
    "hermetica_getStakingApy",
    "arkadiko_getStakingApr",
    "pox_getRewardEstimate",
];

/// Built-in rows, in registration order.
pub const BUILTIN_TOOLS: &[ToolDescriptor] = &[
    // --- core chain ---
    ToolDescriptor::read(Exact("getBlock"), "Fetching block...", "block-card"),
    ToolDescriptor::read(Exact("getBlockByHeight"), "Fetching block...", "block-card"),
    ToolDescriptor::read(Exact("getLatestBlock"), "Fetching latest block...", "block-card"),
    ToolDescriptor::read(Exact("getRecentBlocks"), "Fetching recent blocks...", "block-list"),
    ToolDescriptor::read(Exact("getTransaction"), "Looking up transaction...", "transaction-card"),
    ToolDescriptor::read(Exact("getTransactionStatus"), "Checking transaction status...", "transaction-card"),
    ToolDescriptor::read(Exact("getMempoolTransactions"), "Reading mempool...", "transaction-list"),
    ToolDescriptor::read(Exact("getNetworkStatus"), "Checking network status...", "network-status"),
    ToolDescriptor::read(Exact("getFeeEstimate"), "Estimating fees...", "fee-estimate"),
    ToolDescriptor::read(Exact("getStxSupply"), "Fetching STX supply...", "supply-card"),
    // --- accounts ---
    ToolDescriptor::read(Exact("getStxBalance"), "Fetching STX balance...", "balance-card"),
    ToolDescriptor::read(Exact("getAccountInfo"), "Fetching account...", "account-card"),
    ToolDescriptor::read(Exact("getAccountBalances"), "Fetching balances...", "balance-list"),
    ToolDescriptor::read(Exact("getAccountTransactions"), "Fetching account history...", "transaction-list"),
    ToolDescriptor::read(Exact("getAccountAssets"), "Fetching account assets...", "asset-list"),
    ToolDescriptor::read(Exact("getAccountNonces"), "Fetching nonces...", "raw-json"),
    ToolDescriptor::read(Exact("getStackingStatus"), "Checking stacking status...", "stacking-status"),
    // --- contracts ---
    ToolDescriptor::read(Exact("getContractInfo"), "Fetching contract...", "contract-card"),
    ToolDescriptor::read(Exact("getContractSource"), "Fetching contract source...", "contract-source"),
    ToolDescriptor::read(Exact("getContractInterface"), "Fetching contract interface...", "contract-interface"),
    ToolDescriptor::read(Exact("getContractEvents"), "Fetching contract events...", "event-list"),
    ToolDescriptor::read(Exact("callReadOnlyFunction"), "Calling read-only function...", "clarity-value"),
    ToolDescriptor::action(Exact("deployContract"), "Preparing deployment...", "contract-deploy", ContractDeploy),
    ToolDescriptor::action(Exact("callContract"), "Preparing contract call...", "contract-call", ContractCall),
    // --- tokens and NFTs ---
    ToolDescriptor::read(Exact("getTokenBalance"), "Fetching token balance...", "balance-card"),
    ToolDescriptor::read(Exact("getTokenMetadata"), "Fetching token metadata...", "token-card"),
    ToolDescriptor::read(Exact("getTokenHolders"), "Fetching token holders...", "holder-list"),
    ToolDescriptor::read(Exact("getNftMetadata"), "Fetching NFT metadata...", "nft-card"),
    ToolDescriptor::read(Exact("getNftHistory"), "Fetching NFT history...", "nft-history"),
    ToolDescriptor::action(Exact("transferNft"), "Preparing NFT transfer...", "nft-transfer", ContractCall),
    ToolDescriptor::action(SetMembership(STX_TRANSFERS), "Preparing STX transfer...", "stx-transfer", StxTransfer),
    ToolDescriptor::action(SetMembership(TOKEN_TRANSFERS), "Preparing token transfer...", "token-transfer", TokenTransfer),
    ToolDescriptor::read(SetMembership(NFT_GALLERY), "Loading collectibles...", "nft-gallery"),
    // --- ALEX ---
    ToolDescriptor::read(Exact("alexGetAllPools"), "Fetching ALEX pools...", "alex-pool-list"),
    ToolDescriptor::read(Exact("alexGetPoolDetails"), "Fetching ALEX pool...", "alex-pool-detail"),
    ToolDescriptor::read(Exact("alexGetSwapQuote"), "Quoting ALEX swap...", "swap-quote"),
    ToolDescriptor::read(Exact("alexGetRoute"), "Finding ALEX route...", "swap-route"),
    ToolDescriptor::read(Exact("alexGetPoolStats"), "Fetching ALEX pool stats...", "alex-pool-detail"),
    ToolDescriptor::read(Exact("alexGetLaunchpads"), "Fetching ALEX launchpads...", "launchpad-list"),
    ToolDescriptor::read(Exact("alexGetOrderbook"), "Fetching ALEX orderbook...", "orderbook"),
    ToolDescriptor::read(Exact("alexGetTokenList"), "Fetching ALEX tokens...", "token-list"),
    ToolDescriptor::action(SetMembership(ALEX_LIQUIDITY_ACTIONS), "Preparing ALEX liquidity change...", "liquidity-action", ContractCall),
    // --- Velar: action prefix is registered before the read prefix ---
    ToolDescriptor::action(Prefix("velar_prepare"), "Preparing Velar transaction...", "velar-action", ContractCall),
    ToolDescriptor::read(Exact("velar_getPools"), "Fetching Velar pools...", "pool-table"),
    ToolDescriptor::read(Prefix("velar_"), "Querying Velar...", "velar-data"),
    // --- Bitflow ---
    ToolDescriptor::read(Exact("bitflow_getQuote"), "Quoting Bitflow swap...", "swap-quote"),
    ToolDescriptor::read(Exact("bitflow_getRoutes"), "Finding Bitflow routes...", "swap-route"),
    ToolDescriptor::read(Prefix("bitflow_get"), "Querying Bitflow...", "bitflow-data"),
    // --- Charisma ---
    ToolDescriptor::read(Exact("charisma_getTokens"), "Fetching Charisma tokens...", "token-list"),
    ToolDescriptor::read(Exact("charisma_getQuote"), "Quoting Charisma swap...", "swap-quote"),
    ToolDescriptor::action(SetMembership(SWAP_ACTIONS), "Preparing swap...", "swap-action", ContractCall),
    // --- Arkadiko ---
    ToolDescriptor::read(Exact("arkadiko_getCollateralTypes"), "Fetching Arkadiko collateral types...", "collateral-list"),
    ToolDescriptor::read(Exact("arkadiko_getStakingPositions"), "Fetching Arkadiko staking...", "staking-positions"),
    ToolDescriptor::read(Exact("arkadiko_getLiquidations"), "Fetching Arkadiko liquidations...", "liquidation-list"),
    ToolDescriptor::action(SetMembership(ARKADIKO_ACTIONS), "Preparing Arkadiko vault transaction...", "vault-action", ContractCall),
    // --- Zest ---
    ToolDescriptor::read(Exact("zest_getRewards"), "Fetching Zest rewards...", "rewards-card"),
    ToolDescriptor::read(Exact("zest_getAssets"), "Fetching Zest assets...", "asset-list"),
    ToolDescriptor::action(SetMembership(ZEST_ACTIONS), "Preparing Zest transaction...", "lending-action", ContractCall),
    // --- Granite ---
    ToolDescriptor::read(Exact("granite_getCollaterals"), "Fetching Granite collaterals...", "collateral-list"),
    ToolDescriptor::read(Exact("granite_getBorrowCapacity"), "Computing borrow capacity...", "borrow-capacity"),
    ToolDescriptor::action(SetMembership(GRANITE_ACTIONS), "Preparing Granite transaction...", "lending-action", ContractCall),
    // --- StackingDAO ---
    ToolDescriptor::read(Exact("stackingdao_getWithdrawals"), "Fetching StackingDAO withdrawals...", "withdrawal-list"),
    ToolDescriptor::read(Exact("stackingdao_getPosition"), "Fetching StackingDAO position...", "staking-positions"),
    ToolDescriptor::action(SetMembership(STACKINGDAO_ACTIONS), "Preparing StackingDAO transaction...", "liquid-stacking-action", ContractCall),
    // --- Hermetica ---
    ToolDescriptor::read(Exact("hermetica_getPosition"), "Fetching Hermetica position...", "staking-positions"),
    ToolDescriptor::action(Exact("hermetica_prepareStake"), "Preparing USDh stake...", "staking-action", ContractCall),
    ToolDescriptor::action(Exact("hermetica_prepareUnstake"), "Preparing USDh unstake...", "staking-action", ContractCall),
    // --- sBTC ---
    ToolDescriptor::read(Exact("sbtc_getBalance"), "Fetching sBTC balance...", "balance-card"),
    ToolDescriptor::read(Exact("sbtc_getDepositStatus"), "Checking sBTC deposit...", "deposit-status"),
    ToolDescriptor::read(Exact("sbtc_getWithdrawalStatus"), "Checking sBTC withdrawal...", "deposit-status"),
    // --- PoX stacking ---
    ToolDescriptor::read(Exact("pox_getInfo"), "Fetching PoX info...", "pox-info"),
    ToolDescriptor::read(Exact("pox_getCycle"), "Fetching stacking cycle...", "pox-cycle"),
    ToolDescriptor::read(Exact("pox_getStackerInfo"), "Fetching stacker info...", "stacking-status"),
    ToolDescriptor::read(Exact("pox_getRewardSlots"), "Fetching reward slots...", "reward-slots"),
    ToolDescriptor::read(Exact("pox_getSigners"), "Fetching signers...", "signer-list"),
    ToolDescriptor::action(SetMembership(POX_ACTIONS), "Preparing stacking transaction...", "stacking-action", ContractCall),
    // --- BNS ---
    ToolDescriptor::read(Exact("bns_resolveName"), "Resolving name...", "bns-name"),
    ToolDescriptor::read(Exact("bns_getNameInfo"), "Fetching name info...", "bns-name"),
    ToolDescriptor::read(Exact("bns_checkAvailability"), "Checking name availability...", "bns-availability"),
    ToolDescriptor::read(Exact("bns_getNamespaces"), "Fetching namespaces...", "bns-namespaces"),
    ToolDescriptor::action(Exact("bns_prepareRegister"), "Preparing name registration...", "bns-action", ContractCall),
    ToolDescriptor::action(Exact("bns_prepareTransfer"), "Preparing name transfer...", "bns-action", ContractCall),
    // --- shared displays ---
    ToolDescriptor::read(SetMembership(LENDING_MARKETS), "Fetching lending markets...", "lending-markets"),
    ToolDescriptor::read(SetMembership(LENDING_POSITIONS), "Fetching positions...", "lending-positions"),
    ToolDescriptor::read(SetMembership(POOL_TABLES), "Fetching pools...", "pool-table"),
    ToolDescriptor::read(SetMembership(PRICE_TICKERS), "Fetching prices...", "price-ticker"),
    ToolDescriptor::read(SetMembership(PROTOCOL_STATS), "Fetching protocol stats...", "protocol-stats"),
    ToolDescriptor::read(SetMembership(YIELD_RATES), "Fetching yields...", "yield-card"),
];
