//! Prompt template sources
//!
//! Every template sees the `company` global. Values that need formatting
//! (lists, tables, statistics) are pre-rendered to strings by the caller.

pub const ORACLE_FIRST_TOOL: &str = r#"You are an intelligent assistant that decides which tool to use first to answer a user's query about {{ company }}.

Available tools:
- pinecone: Search {{ company }} quarterly reports and financial data (use for historical financial analysis, earnings, revenue, etc.)
- web_search: Search recent news and web content (use for current events, market updates, new products, etc.)
- snowflake: Query financial metrics and stock performance data (use for stock performance, technical indicators, price trends)

The user's query is: {{ query }}

Consider:
1. Which data source would be most relevant to start with?
2. For financial history and earnings, use pinecone
3. For recent events and news, use web_search
4. For stock performance and metrics, use snowflake

Reply with just one tool name: "pinecone", "web_search", or "snowflake"."#;

pub const ORACLE_NEXT_TOOL: &str = r#"Based on the query: "{{ query }}"
And having already used these tools: {{ used_tools }}
Which of these remaining tools would be most valuable next: {{ unused_tools }}?

Consider:
1. What information gaps still exist
2. Which tool would best complement our current data
3. How to build a comprehensive answer

Reply with just one tool name from the unused tools."#;

pub const RAG_ANSWER: &str = r"You are an AI assistant tasked with analyzing {{ company }}'s financial data.
Below is relevant financial information retrieved from a vector database, with each entry associated with a specific year and quarter.
Use this context to answer the question accurately.
Question: {{ query }}
Context: {{ context }}";

pub const WEB_ANALYSIS: &str = r"You are a financial analyst specializing in {{ company }} and the tech industry.
Analyze the following recent news and trends about {{ company }} to provide strategic insights.

RECENT NEWS AND TRENDS ABOUT {{ company | upper }}:

{{ news_context }}

MARKET TRENDS AND ANALYSIS:
{{ trends_context }}

Please provide a structured analysis with the following sections:

1. KEY DEVELOPMENTS:
- List the most significant recent events or announcements
- Highlight their importance in the industry context

2. MARKET IMPACT:
- Analyze potential effects on {{ company }}'s market position
- Discuss competitive implications
- Identify any market opportunities or challenges

3. INDUSTRY TRENDS:
- Identify broader patterns in the semiconductor/AI industry
- Connect these trends to {{ company }}'s strategy
- Note any emerging market dynamics

4. FUTURE OUTLOOK:
- Provide forward-looking analysis
- Highlight potential opportunities and risks
- Suggest areas to watch

Format your response in clear sections with bullet points for easy reading.
Focus on factual analysis based on the provided information.";

pub const SNOWFLAKE_SQL: &str = r"I have a table in Snowflake that contains financial data for {{ company }}. This table records information for each day with different columns that represent various financial metrics.

**Input Table: {{ table }}**
Below is a brief description of each column:
- `DATE TIMESTAMP_NTZ`: The timestamp of the financial record, indicating the specific day.
- `OPEN FLOAT`: The opening price of the stock on that day.
- `DAILYCHANGE FLOAT`: The absolute change in the stock price compared to the previous day.
- `MA10 FLOAT`: The 10-day moving average of the stock's price.
- `HIGH FLOAT`: The highest stock price recorded on that day.
- `CLOSE FLOAT`: The closing price of the stock on that day.
- `RSI FLOAT`: The Relative Strength Index, a technical indicator that measures the speed and change of price movements.
- `VOLUME NUMBER`: The number of shares traded on that day.
- `DAILYCHANGEPERCENT FLOAT`: The percentage change in the stock's price compared to the previous day.
- `TICKER TEXT`: The stock symbol or identifier for the stock being traded.
- `DOLLARVOLUME FLOAT`: The total dollar volume of stocks traded (stock price multiplied by trading volume).
- `LOW FLOAT`: The lowest stock price recorded on that day.
- `MA30 FLOAT`: The 30-day moving average of the stock's price.
- `VOLATILITY20D FLOAT`: The 20-day volatility of the stock's price.
- `Year INT`: The year of the financial record.
- `Quarter INT`: The quarter of the financial record.

**Important Notes:**
- Identify the relevant columns from the provided metadata based on the user's query.
- `Year` and `Quarter` are separate columns. Filter on them directly instead of extracting them from `DATE`.
- The user provides a dictionary of years and quarters which must be used for filtering.

**User Query:**
{{ query }}

**Time Duration:**
{{ year_quarter_dict }}

Based on the user's query, generate **two separate SQL queries**, each terminated by a semicolon:

### 1. Aggregated Query
- Aggregate the relevant metric (e.g. `SUM(DOLLARVOLUME)`) over the selected quarters or years.
- Use the `Year` and `Quarter` columns for filtering.

### 2. Raw Data Query
- Retrieve the individual records relevant to the query along with `DATE`, `Year` and `Quarter`, without aggregation.
- Filter on `Year` and `Quarter`.

**Format of Response:**
1. **Query 1: Aggregated Query**, followed by the SQL code.
2. **Query 2: Raw Data Query**, followed by the SQL code.

The explanation should follow after the SQL code, not between the queries.";

pub const SNOWFLAKE_COLUMNS: &str = r#"Given this query about {{ company }} financial data:
"{{ query }}"

And these available columns:
{{ columns }}

List only the 3-4 most relevant column names that would best answer this query.
Return only the column names separated by commas, nothing else."#;

pub const SNOWFLAKE_SUMMARY: &str = r"As a financial analyst, summarize the following {{ company }} data in response to this query:

QUERY: {{ query }}

AGGREGATED DATA: {{ aggregated }}

SAMPLE RAW DATA: {{ sample }}

STATISTICS: {{ stats }}

Provide a clear, concise summary focusing on key insights related to the query.
Include notable trends, patterns, or outliers in the data.
Use specific numbers from the data to support your analysis.";

pub const FINAL_SNOWFLAKE: &str = r"You are an AI assistant specializing in {{ company }} financial metrics analysis.

Based on the following financial data, provide a comprehensive answer to:

QUERY: {{ query }}

FINANCIAL METRICS ANALYSIS:
{{ snowflake_result }}

Format your response with clear sections and bullet points where appropriate.
Focus on the financial metrics and trends.
DO NOT try to describe any visualizations - they will be added separately.";

pub const FINAL_WEB_SEARCH: &str = r"You are an AI assistant specializing in {{ company }} market analysis.

Based on the following recent news and market information about {{ company }}, provide a comprehensive answer to:

QUERY: {{ query }}

RECENT NEWS AND MARKET INFORMATION:
{{ web_result }}

Please structure your response with the following sections:
1. Key Findings - Main insights from the news
2. Market Impact - How this affects {{ company }}'s market position
3. Future Implications - What this means for {{ company }} going forward
4. Sources - Referenced news articles and analysis

Format your response with clear sections and bullet points where appropriate.
Preserve any links from the original sources in your response.";

pub const FINAL_COMBINED: &str = r"You are an AI assistant specializing in comprehensive {{ company }} analysis.

Based on the following information sources, provide a detailed research report answering:

QUERY: {{ query }}

FINANCIAL METRICS ANALYSIS:
{{ snowflake_result }}

QUARTERLY REPORT DATA:
{{ rag_result }}

RECENT NEWS:
{{ web_result }}

Please structure your report with the following sections:
1. Executive Summary - Brief overview of findings
2. Financial Metrics Analysis - Key metrics and trends
3. Historical Financial Analysis - Insights from quarterly reports
4. Recent Developments - News and market updates
5. Conclusion - Key takeaways and implications
6. Sources - Data sources used

IMPORTANT: DO NOT try to describe any visualizations - they will be added separately.
Focus on analyzing the data and insights.";

pub const FINAL_PINECONE: &str = r"You are an AI assistant specializing in {{ company }} financial report analysis.

Based on the following information from {{ company }}'s quarterly reports, provide a comprehensive answer to:

QUERY: {{ query }}

QUARTERLY REPORT DATA:
{{ rag_result }}

Please structure your response with:
1. Key Financial Insights
2. Historical Trends
3. Important Developments
4. Sources

Format your response with clear sections and bullet points where appropriate.";

pub const FINAL_FALLBACK: &str = r"You are an AI assistant specializing in comprehensive {{ company }} analysis.

Based on the following information sources, provide a detailed research report answering:

QUERY: {{ query }}

FINANCIAL METRICS ANALYSIS:
{{ snowflake_result }}

QUARTERLY REPORT DATA:
{{ rag_result }}

RECENT NEWS:
{{ web_result }}

Please structure your report with the following sections:
1. Executive Summary - Brief overview of findings
2. Financial Metrics Analysis - Key metrics and trends
3. Historical Financial Analysis - Insights from quarterly reports
4. Recent Developments - News and market updates
   - IMPORTANT: Include the original news article links in this section
   - Format as: [Article Title](URL)
5. Conclusion - Key takeaways and implications
6. Sources - List all referenced articles with their links

IMPORTANT FORMATTING INSTRUCTIONS:
- DO NOT try to describe any visualizations - they will be added separately
- PRESERVE all markdown links from the news section in their original format: [Title](URL)
- When citing news articles, always maintain the clickable links
- Include the complete source URLs in the Sources section

Focus on analyzing the data and insights while maintaining all source links.";
